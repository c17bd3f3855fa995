use axum::body::Body;
use axum::response::Response;
use http::{StatusCode, header};

/// Render the 403 denial page.
///
/// The body is identical for every deny reason so a caller cannot probe
/// which check rejected them. The configured contact address is the only
/// variable content; when it is empty the contact line is omitted.
pub fn denial_response(contact_label: &str, contact_email: &str) -> Response {
    let contact = if contact_email.is_empty() {
        String::new()
    } else {
        let label = if contact_label.is_empty() {
            contact_email
        } else {
            contact_label
        };
        format!(
            "<p>If you believe you should have access, contact \
             <a href=\"mailto:{contact_email}\">{label}</a>.</p>\n"
        )
    };

    let body = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>Access denied</title></head>\n\
         <body>\n\
         <h1>Access denied</h1>\n\
         <p>This service is not available from your network.</p>\n\
         {contact}\
         </body>\n\
         </html>\n"
    );

    html_response(StatusCode::FORBIDDEN, body)
}

/// Neutral body for an unreachable origin.
pub fn bad_gateway_response() -> Response {
    html_response(
        StatusCode::BAD_GATEWAY,
        "<!DOCTYPE html>\n<html lang=\"en\"><body><h1>502 Bad Gateway</h1></body></html>\n"
            .to_owned(),
    )
}

/// Neutral body for an origin that did not answer in time.
pub fn gateway_timeout_response() -> Response {
    html_response(
        StatusCode::GATEWAY_TIMEOUT,
        "<!DOCTYPE html>\n<html lang=\"en\"><body><h1>504 Gateway Timeout</h1></body></html>\n"
            .to_owned(),
    )
}

fn html_response(status: StatusCode, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(body))
        .expect("static response parts are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_carries_contact_mailto() {
        let response = denial_response("Service Desk", "desk@example.com");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn empty_email_omits_contact_line() {
        let response = denial_response("", "");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
