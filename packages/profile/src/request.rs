//! Request descriptors handed to the transport.

use strum::{AsRefStr, Display, EnumString};

use crate::MetricSample;

pub const METRICS_PATH: &str = "/metrics";
pub const ANALYZE_PATH: &str = "/analyze";
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// A request to send to the ingestion service.
///
/// `path` is relative to the service root; joining it onto a host is the
/// transport's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: &'static str,
    pub body: Option<MetricSample>,
}

impl Request {
    #[must_use]
    pub const fn post_metric(sample: MetricSample) -> Self {
        Self {
            method: Method::Post,
            path: METRICS_PATH,
            body: Some(sample),
        }
    }

    #[must_use]
    pub const fn get(path: &'static str) -> Self {
        Self {
            method: Method::Get,
            path,
            body: None,
        }
    }

    /// Label used to group outcomes of this request in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.path
    }

    /// Serializes the body, if any, to JSON.
    ///
    /// # Errors
    ///
    /// * If the body fails to serialize
    pub fn json_body(&self) -> Result<Option<String>, serde_json::Error> {
        self.body.as_ref().map(serde_json::to_string).transpose()
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn test_method_names() {
        assert_eq!(Method::Get.as_ref(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
    }

    #[test_log::test]
    fn test_get_has_no_body() {
        let request = Request::get(HEALTH_PATH);

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.json_body().unwrap(), None);
        assert_eq!(request.to_string(), "GET /health");
        assert_eq!(request.name(), "/health");
    }

    #[test_log::test]
    fn test_post_metric_body() {
        let request = Request::post_metric(MetricSample {
            timestamp: 5,
            cpu: 1.0,
            rps: 2.5,
        });

        assert_eq!(request.path, "/metrics");
        assert_eq!(
            request.json_body().unwrap().as_deref(),
            Some(r#"{"timestamp":5,"cpu":1.0,"rps":2.5}"#)
        );
    }
}
