use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use ureq::ResponseExt;

use crate::error::{Result, ScrapeError};

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Desktop browser user agent; the upstream site serves reduced markup to bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Redirect hops followed before giving up
const MAX_REDIRECTS: u32 = 10;

/// Everything needed to build an HTTP agent
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Headers sent with every request
    pub base_headers: Vec<(String, String)>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_headers: default_headers(),
        }
    }
}

/// Headers sent by default alongside the user agent
pub fn default_headers() -> Vec<(String, String)> {
    vec![
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
    ]
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    /// Raw HTML content
    pub html: String,
}

/// Anything that can turn a URL into page markup
pub trait PageSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Blocking HTTP fetcher (ureq)
pub struct PageFetcher {
    agent: ureq::Agent,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(config: FetchConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .max_redirects(MAX_REDIRECTS)
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent, config }
    }
}

impl PageSource for PageFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage> {
        info!("Fetching page: {}", url);
        let mut request = self.agent.get(url);

        for (key, value) in &self.config.base_headers {
            request = request.header(key, value);
        }
        request = request.header("User-Agent", &self.config.user_agent);

        let response = request.call().map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let final_url = response.get_uri().to_string();
        let html = response
            .into_body()
            .read_to_string()
            .map_err(network_error)?;

        debug!(url = %final_url, bytes = html.len(), "fetched page");
        Ok(FetchedPage { url: final_url, html })
    }
}

fn network_error(err: ureq::Error) -> ScrapeError {
    match err {
        ureq::Error::StatusCode(status) => ScrapeError::Fetch {
            status,
            url: String::new(),
        },
        other => ScrapeError::from(other),
    }
}

/// Minimum spacing between requests, shared by every worker of a batch
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `rate` is requests per second; zero, negative or non-finite disables throttling
    pub fn per_second(rate: f64) -> Self {
        let min_interval = if rate.is_finite() && rate > 0.0 {
            Some(Duration::from_secs_f64(1.0 / rate))
        } else {
            None
        };
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::per_second(0.0)
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Block until the next request slot is available and claim it
    pub fn acquire(&self) {
        let Some(min_delay) = self.min_interval else {
            return;
        };

        // Holding the lock while sleeping serializes waiters onto distinct slots
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last_fetch) = *last {
            let elapsed = last_fetch.elapsed();
            if elapsed < min_delay {
                std::thread::sleep(min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Answer successive connections on a loopback port with canned responses.
    /// `{addr}` in a response is replaced by the listener's address.
    fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let base = format!("http://{}", addr);
        std::thread::spawn(move || {
            for response in responses {
                if let Ok((mut stream, _)) = listener.accept() {
                    let mut buf = [0u8; 2048];
                    let _ = stream.read(&mut buf);
                    let _ = stream.write_all(response.replace("{addr}", &addr).as_bytes());
                    let _ = stream.flush();
                }
            }
        });
        base
    }

    fn serve_once(response: &'static str) -> String {
        format!("{}/homedetails/1_zpid/", serve(vec![response]))
    }

    fn fetcher() -> PageFetcher {
        PageFetcher::new(FetchConfig {
            timeout: Duration::from_secs(5),
            ..FetchConfig::default()
        })
    }

    #[test]
    fn test_fetch_success() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 13\r\nConnection: close\r\n\r\n<h1>home</h1>",
        );
        let page = fetcher().fetch(&url).unwrap();
        assert_eq!(page.html, "<h1>home</h1>");
        assert!(page.url.contains("1_zpid"));
    }

    #[test]
    fn test_fetch_not_found_is_fetch_error() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        match fetcher().fetch(&url) {
            Err(ScrapeError::Fetch { status, url: failed }) => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_connection_refused_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = fetcher().fetch(&format!("http://127.0.0.1:{}/", port));
        assert!(matches!(result, Err(ScrapeError::Network(_))));
    }

    #[test]
    fn test_fetch_follows_redirect() {
        let base = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: http://{addr}/homedetails/9-Elm-Ave/9_zpid/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 14\r\nConnection: close\r\n\r\n<h1>final</h1>",
        ]);

        let page = fetcher().fetch(&format!("{}/homedetails/9_zpid/", base)).unwrap();
        assert_eq!(page.html, "<h1>final</h1>");
        assert!(page.url.ends_with("/homedetails/9-Elm-Ave/9_zpid/"));
    }

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(15));
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert!(config.base_headers.iter().any(|(k, _)| k == "Accept-Language"));
    }

    #[test]
    fn test_rate_limiter_disabled() {
        assert!(RateLimiter::per_second(0.0).min_interval().is_none());
        assert!(RateLimiter::per_second(-1.0).min_interval().is_none());
        assert!(RateLimiter::per_second(f64::NAN).min_interval().is_none());
        assert_eq!(
            RateLimiter::per_second(4.0).min_interval(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::per_second(20.0);
        let start = Instant::now();
        limiter.acquire();
        limiter.acquire();
        limiter.acquire();
        // Two waits of 50ms after the first free slot
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
