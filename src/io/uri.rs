use anyhow::{Result, anyhow};
use std::path::PathBuf;
use url::Url;

/// Where published artifacts go, resolved once from `Settings::output_uri`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Directory on the local filesystem
    Local(PathBuf),
    /// Remote object storage
    Remote(RemoteDestination),
}

/// Remote object storage location (bucket plus key prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDestination {
    pub bucket: String,
    pub prefix: String,
}

impl RemoteDestination {
    /// Object key for a file published under `name`
    pub fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl Destination {
    /// Parse an output URI into a Destination
    pub fn parse(uri: &str) -> Result<Self> {
        match parse_url(uri) {
            Some(url) => match url.scheme() {
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow!("Invalid file:// URI: {}", uri))?;
                    Ok(Destination::Local(path))
                }
                "s3" => {
                    let bucket = url
                        .host_str()
                        .filter(|host| !host.is_empty())
                        .ok_or_else(|| anyhow!("S3 URI missing bucket: {}", uri))?
                        .to_string();

                    let prefix = url.path().trim_matches('/').to_string();

                    Ok(Destination::Remote(RemoteDestination { bucket, prefix }))
                }
                scheme => Err(anyhow!("Unsupported output URI scheme: {}", scheme)),
            },
            None => Ok(Destination::Local(PathBuf::from(uri))),
        }
    }
}

/// Where events are delivered, resolved once from `Settings::event_uri`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEndpoint {
    /// JSON POST to an HTTP(S) endpoint
    Http(Url),
    /// JSON lines appended to a local file
    File(PathBuf),
}

impl EventEndpoint {
    /// Parse an event URI into an EventEndpoint
    pub fn parse(uri: &str) -> Result<Self> {
        match parse_url(uri) {
            Some(url) => match url.scheme() {
                "http" | "https" => Ok(EventEndpoint::Http(url)),
                "file" => {
                    let path = url
                        .to_file_path()
                        .map_err(|_| anyhow!("Invalid file:// URI: {}", uri))?;
                    Ok(EventEndpoint::File(path))
                }
                scheme => Err(anyhow!("Unsupported event URI scheme: {}", scheme)),
            },
            None => Ok(EventEndpoint::File(PathBuf::from(uri))),
        }
    }
}

/// Parse as a URL, treating bare paths (including `C:\...` drive paths) as None
fn parse_url(uri: &str) -> Option<Url> {
    let url = Url::parse(uri).ok()?;
    // A single-letter scheme is a Windows drive letter, not a URI scheme
    if url.scheme().len() == 1 {
        return None;
    }
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_destination() {
        let dest = Destination::parse("s3://results-bucket/runs/1234/").unwrap();
        match dest {
            Destination::Remote(remote) => {
                assert_eq!(remote.bucket, "results-bucket");
                assert_eq!(remote.prefix, "runs/1234");
                assert_eq!(remote.key_for("error.log"), "runs/1234/error.log");
            }
            _ => panic!("Expected remote destination"),
        }
    }

    #[test]
    fn test_parse_s3_destination_without_prefix() {
        let dest = Destination::parse("s3://results-bucket").unwrap();
        match dest {
            Destination::Remote(remote) => {
                assert_eq!(remote.prefix, "");
                assert_eq!(remote.key_for("test_results.xml"), "test_results.xml");
            }
            _ => panic!("Expected remote destination"),
        }
    }

    #[test]
    fn test_parse_s3_missing_bucket() {
        assert!(Destination::parse("s3:///prefix").is_err());
    }

    #[test]
    fn test_parse_file_destination() {
        let dest = Destination::parse("file:///data/out").unwrap();
        assert_eq!(dest, Destination::Local(PathBuf::from("/data/out")));
    }

    #[test]
    fn test_parse_bare_path_destination() {
        let dest = Destination::parse("/data/out").unwrap();
        assert_eq!(dest, Destination::Local(PathBuf::from("/data/out")));

        let dest = Destination::parse("relative/out").unwrap();
        assert!(matches!(dest, Destination::Local(_)));
    }

    #[test]
    fn test_parse_drive_letter_is_local() {
        let dest = Destination::parse(r"C:\helix\out").unwrap();
        assert!(matches!(dest, Destination::Local(_)));
    }

    #[test]
    fn test_parse_unsupported_destination_scheme() {
        let err = Destination::parse("ftp://host/out").unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_parse_http_event_endpoint() {
        let endpoint = EventEndpoint::parse("https://events.example.com/api/events").unwrap();
        assert!(matches!(endpoint, EventEndpoint::Http(_)));
    }

    #[test]
    fn test_parse_file_event_endpoint() {
        let endpoint = EventEndpoint::parse("file:///tmp/events.jsonl").unwrap();
        assert_eq!(
            endpoint,
            EventEndpoint::File(PathBuf::from("/tmp/events.jsonl"))
        );

        let endpoint = EventEndpoint::parse("events.jsonl").unwrap();
        assert!(matches!(endpoint, EventEndpoint::File(_)));
    }

    #[test]
    fn test_parse_unsupported_event_scheme() {
        assert!(EventEndpoint::parse("amqp://bus/events").is_err());
    }
}
