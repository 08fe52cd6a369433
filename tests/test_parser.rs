use status_echo::http::parser::{
    parse_final_request, parse_http_request, parse_start_line, parse_status_line, ParseError,
};
use status_echo::http::request::Method;
use status_echo::http::status::StatusCode;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.get("host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.path, "/api");
    assert_eq!(parsed.body, b"hello".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_leaves_following_request_unconsumed() {
    let req = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.path, "/a");
    assert_eq!(&req[consumed..], b"GET /b HTTP/1.1\r\n\r\n");
}

#[test]
fn test_parse_header_names_are_lowercased_and_trimmed() {
    let req = b"GET / HTTP/1.1\r\n  Content-Type :  application/json  \r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    let headers: Vec<_> = parsed.headers.iter().collect();
    assert_eq!(headers, vec![("content-type", "application/json")]);
    assert_eq!(parsed.header("Content-Type"), Some("application/json"));
}

#[test]
fn test_parse_header_value_keeps_colons() {
    let req = b"GET / HTTP/1.1\r\nHost: localhost:9999\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.header("host"), Some("localhost:9999"));
}

#[test]
fn test_parse_duplicate_headers_first_wins() {
    let req = b"GET / HTTP/1.1\r\nX-Tag: one\r\nX-Tag: two\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.header("x-tag"), Some("one"));
    assert_eq!(parsed.headers.get_all("x-tag").collect::<Vec<_>>(), vec!["one", "two"]);
    assert_eq!(parsed.headers.len(), 2);
}

#[test]
fn test_parse_skips_header_lines_without_colon() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\nHost: x\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.len(), 1);
    assert_eq!(parsed.header("host"), Some("x"));
}

#[test]
fn test_parse_accepts_bare_newlines() {
    let req = b"GET /x HTTP/1.0\nHost: x\n\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.path, "/x");
    assert_eq!(parsed.version, "HTTP/1.0");
    assert_eq!(parsed.header("host"), Some("x"));
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_query_parameters() {
    let req = b"GET /search?q=rust&tag=a&tag=b&empty= HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.target, "/search?q=rust&tag=a&tag=b&empty=");
    assert_eq!(parsed.path, "/search");
    assert_eq!(parsed.query.get("q"), Some("rust"));
    assert_eq!(parsed.query.get_all("tag"), &["a", "b"]);
    assert_eq!(parsed.query.get("empty"), Some(""));
    assert!(parsed.query.get_all("missing").is_empty());
}

#[test]
fn test_parse_status_override() {
    let cases = [
        ("/?status=404", 404),
        ("/?status=500", 500),
        ("/?status=999", 200),
        ("/?status=abc", 200),
        ("/?status=", 200),
        ("/?status=418&status=500", 418),
        ("/", 200),
    ];

    for (target, expected) in cases {
        let raw = format!("GET {target} HTTP/1.1\r\n\r\n");
        let (parsed, _) = parse_http_request(raw.as_bytes()).unwrap();
        assert_eq!(parsed.status_override().as_u16(), expected, "target {target}");
    }
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_parse_incomplete_start_line() {
    assert_eq!(parse_http_request(b"GET / HT").unwrap_err(), ParseError::Incomplete);
    assert_eq!(parse_http_request(b"").unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
    let result = parse_http_request(req);

    assert!(matches!(result, Err(ParseError::Incomplete)));
}

#[test]
fn test_final_parse_at_end_of_input() {
    let req = parse_final_request(b"GET /?status=404 HTTP/1.1\r\nHost: x\r\n").unwrap();
    assert_eq!(req.status_override(), StatusCode::NOT_FOUND);
    assert_eq!(req.headers.get("host"), Some("x"));

    let bare = parse_final_request(b"PUT /a HTTP/1.0").unwrap();
    assert_eq!(bare.method, Method::PUT);
    assert!(bare.headers.is_empty());

    assert_eq!(
        parse_final_request(b"GARBAGE").unwrap_err(),
        ParseError::MalformedStartLine
    );
    assert!(matches!(
        parse_final_request(b"DELETE / HTTP/1.1\r\n"),
        Err(ParseError::UnsupportedMethod(_))
    ));
    assert_eq!(
        parse_final_request(b"POST / HTTP/1.1\r\nContent-Length: 4\r\n\r\nab").unwrap_err(),
        ParseError::TruncatedBody
    );
}

#[test]
fn test_parse_wrong_token_count_is_malformed() {
    let cases: [&[u8]; 5] = [
        b"GET /\r\n\r\n",
        b"GET\r\n\r\n",
        b"GET / HTTP/1.1 extra\r\n\r\n",
        b"\r\n\r\n",
        b"GARBAGE\r\n",
    ];

    for raw in cases {
        assert_eq!(
            parse_http_request(raw).unwrap_err(),
            ParseError::MalformedStartLine,
            "input {:?}",
            String::from_utf8_lossy(raw)
        );
    }
}

#[test]
fn test_parse_missing_http_marker_is_malformed() {
    let result = parse_http_request(b"GET / FTP/1.0\r\n\r\n");
    assert_eq!(result.unwrap_err(), ParseError::MalformedStartLine);
}

#[test]
fn test_parse_malformed_start_line_reported_before_headers_end() {
    let result = parse_http_request(b"NONSENSE\r\nHost: x\r\n");
    assert_eq!(result.unwrap_err(), ParseError::MalformedStartLine);
}

#[test]
fn test_parse_unsupported_method() {
    for method in ["DELETE", "OPTIONS", "PATCH", "get"] {
        let raw = format!("{method} / HTTP/1.1\r\n\r\n");
        let err = parse_http_request(raw.as_bytes()).unwrap_err();
        assert_eq!(err, ParseError::UnsupportedMethod(method.to_string()));
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);
    }
}

#[test]
fn test_parse_error_statuses_are_distinct() {
    assert_eq!(ParseError::MalformedStartLine.status().as_u16(), 400);
    assert_eq!(ParseError::InvalidContentLength.status().as_u16(), 400);
    assert_eq!(ParseError::RequestTooLarge(10).status().as_u16(), 400);
    assert_eq!(ParseError::UnsupportedMethod("X".into()).status().as_u16(), 501);
}

#[test]
fn test_parse_non_utf8_start_line() {
    let result = parse_http_request(b"GET /\xff HTTP/1.1\r\n\r\n");
    assert_eq!(result.unwrap_err(), ParseError::MalformedStartLine);
}

#[test]
fn test_parse_invalid_content_length() {
    let result = parse_http_request(b"POST / HTTP/1.1\r\nContent-Length: ten\r\n\r\n");
    assert_eq!(result.unwrap_err(), ParseError::InvalidContentLength);
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("HEAD", Method::HEAD),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} / HTTP/1.1\r\n\r\n", method_str);
        let (parsed, _) = parse_http_request(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_start_line_tolerates_extra_whitespace() {
    let (method, target, version) = parse_start_line("PUT   /x\tHTTP/1.1\r").unwrap();
    assert_eq!(method, Method::PUT);
    assert_eq!(target, "/x");
    assert_eq!(version, "HTTP/1.1");
}

#[test]
fn test_parse_status_line() {
    let (version, status) = parse_status_line(b"HTTP/1.1 404 Not Found\r\nA: b\r\n\r\n").unwrap();
    assert_eq!(version, "HTTP/1.1");
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(parse_status_line(b"HTTP/1.1 999 Nope\r\n").is_err());
    assert!(parse_status_line(b"garbage").is_err());
}
