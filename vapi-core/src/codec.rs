//! Wire codecs: JSON and XML, selected per request by the `format` query parameter.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, CodecError};
use crate::{names, RequestContext, Response};

/// Query parameter consulted by [`Format::from_request`].
pub const FORMAT_PARAM: &str = "format";

/// Route parameter holding the dotted method identifier.
pub const METHOD_PARAM: &str = "method";

/// Encode/decode strategy for one wire format.
pub trait Codec {
    fn content_type(&self) -> &'static str;

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError>;

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Structured error body. Must not fail.
    fn encode_error(&self, message: &str) -> Vec<u8>;

    /// Method name from the `:method` route parameter, suffix title-cased.
    fn method(&self, req: &RequestContext) -> Result<String, ApiError> {
        let raw = req.param(METHOD_PARAM).unwrap_or_default();
        names::normalize_method(raw).ok_or_else(|| ApiError::MethodNotFound(raw.to_owned()))
    }

    /// Populate `target` from the request.
    ///
    /// GET reads the query string (minus `format`) as a form, parsing scalar fields from
    /// their text; other verbs decode the body. An empty form or body leaves `target` at its current value.
    fn read_request<T: DeserializeOwned>(
        &self,
        req: &RequestContext,
        target: &mut T,
    ) -> Result<(), CodecError> {
        if req.method.eq_ignore_ascii_case("GET") {
            let mut form = url::form_urlencoded::Serializer::new(String::new());
            let mut fields = 0;
            for (k, v) in req.query.iter().filter(|(k, _)| k != FORMAT_PARAM) {
                form.append_pair(k, v);
                fields += 1;
            }
            if fields > 0 {
                *target = serde_urlencoded::from_str(&form.finish())
                    .map_err(|e| CodecError::Form(e.to_string()))?;
            }
            return Ok(());
        }
        if req.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        *target = self.decode(&req.body)?;
        Ok(())
    }

    fn write_response(&self, body: Vec<u8>) -> Response {
        Response::new(200, self.content_type(), body)
    }

    fn write_error(&self, status: u16, message: &str) -> Response {
        Response::new(status, self.content_type(), self.encode_error(message))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        "application/json; charset=utf-8"
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(body)?)
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn encode_error(&self, message: &str) -> Vec<u8> {
        serde_json::json!({ "error": message }).to_string().into_bytes()
    }
}

/// Replies are rooted at `<response>`, errors at `<error>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlCodec;

const XML_REPLY_ROOT: &str = "response";

impl Codec for XmlCodec {
    fn content_type(&self) -> &'static str {
        "application/xml; charset=utf-8"
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError> {
        quick_xml::de::from_reader(body).map_err(|e| CodecError::Xml(e.to_string()))
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        quick_xml::se::to_string_with_root(XML_REPLY_ROOT, value)
            .map(String::into_bytes)
            .map_err(|e| CodecError::Xml(e.to_string()))
    }

    fn encode_error(&self, message: &str) -> Vec<u8> {
        format!(
            "<error><message>{}</message></error>",
            quick_xml::escape::escape(message)
        )
        .into_bytes()
    }
}

/// Codec chosen for one request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Xml,
}

impl Format {
    /// `format` values ending in `xml` select XML; anything else, or nothing, selects JSON.
    pub fn from_request(req: &RequestContext) -> Self {
        match req.query_value(FORMAT_PARAM) {
            Some(format) if format.ends_with("xml") => Format::Xml,
            _ => Format::Json,
        }
    }
}

impl Codec for Format {
    fn content_type(&self) -> &'static str {
        match self {
            Format::Json => JsonCodec.content_type(),
            Format::Xml => XmlCodec.content_type(),
        }
    }

    fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, CodecError> {
        match self {
            Format::Json => JsonCodec.decode(body),
            Format::Xml => XmlCodec.decode(body),
        }
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Format::Json => JsonCodec.encode(value),
            Format::Xml => XmlCodec.encode(value),
        }
    }

    fn encode_error(&self, message: &str) -> Vec<u8> {
        match self {
            Format::Json => JsonCodec.encode_error(message),
            Format::Xml => XmlCodec.encode_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
    #[serde(rename_all = "PascalCase", default)]
    struct Item {
        value: String,
        count: u32,
    }

    #[test]
    fn format_selection() {
        let req = RequestContext::new("GET", "/api/X.y");
        assert_eq!(Format::from_request(&req), Format::Json);
        assert_eq!(Format::from_request(&req.clone().with_query("format", "xml")), Format::Xml);
        assert_eq!(
            Format::from_request(&req.clone().with_query("format", "text/xml")),
            Format::Xml
        );
        assert_eq!(
            Format::from_request(&req.with_query("format", "yaml")),
            Format::Json
        );
    }

    #[test]
    fn method_requires_dot() {
        let req = RequestContext::new("POST", "/api/Echo").with_param(METHOD_PARAM, "Echo");
        match JsonCodec.method(&req) {
            Err(ApiError::MethodNotFound(m)) => assert_eq!(m, "Echo"),
            other => panic!("expected MethodNotFound, got {:?}", other),
        }
        let req = RequestContext::new("POST", "/api/Echo.echo").with_param(METHOD_PARAM, "Echo.echo");
        assert_eq!(JsonCodec.method(&req).unwrap(), "Echo.Echo");
    }

    #[test]
    fn json_body_populates_target() {
        let req = RequestContext::new("POST", "/").with_body(r#"{"Value":"x"}"#);
        let mut item = Item::default();
        JsonCodec.read_request(&req, &mut item).unwrap();
        assert_eq!(item, Item { value: "x".into(), count: 0 });
    }

    #[test]
    fn empty_body_keeps_zero_value() {
        let req = RequestContext::new("POST", "/").with_body("  \n");
        let mut item = Item::default();
        JsonCodec.read_request(&req, &mut item).unwrap();
        assert_eq!(item, Item::default());
    }

    #[test]
    fn get_reads_query_form() {
        let req = RequestContext::new("GET", "/")
            .with_query("format", "xml")
            .with_query("Value", "from query");
        let mut item = Item::default();
        XmlCodec.read_request(&req, &mut item).unwrap();
        assert_eq!(item.value, "from query");
    }

    #[test]
    fn get_query_parses_numbers() {
        let req = RequestContext::new("GET", "/")
            .with_query("Count", "7")
            .with_query("Value", "a&b");
        let mut item = Item::default();
        JsonCodec.read_request(&req, &mut item).unwrap();
        assert_eq!(item, Item { value: "a&b".into(), count: 7 });

        let req = RequestContext::new("GET", "/").with_query("Count", "seven");
        assert!(matches!(
            JsonCodec.read_request(&req, &mut Item::default()),
            Err(CodecError::Form(_))
        ));
    }

    #[test]
    fn bad_json_is_codec_error() {
        let req = RequestContext::new("POST", "/").with_body("{not json");
        let mut item = Item::default();
        assert!(matches!(
            JsonCodec.read_request(&req, &mut item),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn xml_reply_and_error() {
        let body = XmlCodec
            .encode(&Item { value: "x".into(), count: 2 })
            .unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("<response>"), "{}", text);
        assert!(text.contains("<Value>x</Value>"), "{}", text);

        let err = String::from_utf8(XmlCodec.encode_error("a < b")).unwrap();
        assert_eq!(err, "<error><message>a &lt; b</message></error>");
    }

    #[test]
    fn xml_body_decodes() {
        let item: Item = XmlCodec
            .decode(b"<request><Value>hi</Value><Count>3</Count></request>")
            .unwrap();
        assert_eq!(item, Item { value: "hi".into(), count: 3 });
    }
}
