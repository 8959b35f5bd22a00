//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（URL / Base64 / 本地文件）的原始字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败：任何一张图加载失败，整次合成直接失败，不产出半成品。
//!
//! ## 实现思路
//!
//! - URL：协议 + 主机安全 + 状态码 + 内容类型 + 体积校验 + 流式下载（可重试）。
//! - Base64：格式解析 + 解码前体积估算。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 所有来源最后都做一次文件签名（magic bytes）校验。
//! - 相框按 URL 缓存解码结果，文字修改触发的重新合成不再重复下载。

use base64::{Engine as _, engine::general_purpose};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::handler::CachedFrame;
use super::source::RawImageData;
use super::{FrameAsset, PhotoConfig, PhotoError, PhotoHandler, PhotoSource, SourceImage};

const NETWORK_RETRY_MAX_ATTEMPTS: u8 = 3;
const NETWORK_RETRY_BASE_DELAY_MS: u64 = 180;
const NETWORK_RETRY_MAX_DELAY_MS: u64 = 2_000;
const MAX_REDIRECTS: usize = 5;
const BUFFER_INITIAL_CAPACITY: usize = 64 * 1024;

/// 单次下载失败的附加信息，决定是否值得重试。
struct DownloadFailure {
    error: PhotoError,
    retryable: bool,
    retry_after_ms: Option<u64>,
}

impl DownloadFailure {
    fn fatal(error: PhotoError) -> Self {
        Self {
            error,
            retryable: false,
            retry_after_ms: None,
        }
    }
}

impl PhotoHandler {
    /// 加载并解码用户照片。
    pub async fn load_source(&self, source: &PhotoSource) -> Result<SourceImage, PhotoError> {
        let config = &self.config;
        let raw = self.load_raw(source, config).await?;
        let pixels = self.decode_rgba(raw, config)?;
        Ok(SourceImage::new(pixels))
    }

    /// 加载并解码相框素材。
    ///
    /// URL 来源命中缓存时直接返回，缓存按 TTL 过期。
    pub async fn load_frame(&self, source: &PhotoSource) -> Result<Arc<FrameAsset>, PhotoError> {
        let config = &self.config;

        let cache_key = match source {
            PhotoSource::Url(url) => Some(url.clone()),
            _ => None,
        };

        if let Some(key) = cache_key.as_deref() {
            if let Some(frame) = self.cached_frame(key, config) {
                log::debug!("♻️ 命中相框缓存 - URL: {}", redact_url_for_log(key));
                return Ok(frame);
            }
        }

        let raw = self.load_raw(source, config).await?;
        let frame = Arc::new(FrameAsset::new(self.decode_rgba(raw, config)?));

        if let Some(key) = cache_key {
            self.store_cached_frame(key, Arc::clone(&frame));
        }

        Ok(frame)
    }

    /// 按来源加载原始字节。
    pub(super) async fn load_raw(
        &self,
        source: &PhotoSource,
        config: &PhotoConfig,
    ) -> Result<RawImageData, PhotoError> {
        match source {
            PhotoSource::Url(url) => self.load_from_url(url, config).await,
            PhotoSource::Base64(data) => self.load_from_base64(data, config),
            PhotoSource::FilePath(path) => self.load_from_file(path, config),
        }
    }

    /// 从 URL 加载图片原始字节。
    pub(super) async fn load_from_url(
        &self,
        url: &str,
        config: &PhotoConfig,
    ) -> Result<RawImageData, PhotoError> {
        log::info!("🌐 开始下载图片 - URL: {}", redact_url_for_log(url));

        validate_url_safety(url, config)?;
        let bytes = self.download_with_retry(url, config).await?;
        validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "url",
        })
    }

    /// 从 Base64 字符串加载图片原始字节。
    pub(super) fn load_from_base64(
        &self,
        data: &str,
        config: &PhotoConfig,
    ) -> Result<RawImageData, PhotoError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = parse_base64_with_limit(data, config.max_file_size)?;

        if bytes.len() as u64 > config.max_file_size {
            return Err(PhotoError::ResourceLimit(format!(
                "Base64 解码后体积过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "base64",
        })
    }

    /// 从本地路径加载图片原始字节。
    pub(super) fn load_from_file(
        &self,
        path: &str,
        config: &PhotoConfig,
    ) -> Result<RawImageData, PhotoError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(PhotoError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| PhotoError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > config.max_file_size {
            return Err(PhotoError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| PhotoError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            source_hint: "file",
        })
    }

    /// 带重试的下载：仅对连接类错误与 429/5xx 重试。
    async fn download_with_retry(
        &self,
        url: &str,
        config: &PhotoConfig,
    ) -> Result<Vec<u8>, PhotoError> {
        let client = build_http_client(config)?;
        let mut attempt: u8 = 0;

        loop {
            attempt += 1;
            match download_once(&client, url, config).await {
                Ok(bytes) => return Ok(bytes),
                Err(failure) if failure.retryable && attempt < NETWORK_RETRY_MAX_ATTEMPTS => {
                    let delay = compute_retry_delay(attempt, failure.retry_after_ms);
                    log::warn!(
                        "🔄 下载失败，{}ms 后重试 {}/{}：{}",
                        delay,
                        attempt + 1,
                        NETWORK_RETRY_MAX_ATTEMPTS,
                        failure.error
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    fn cached_frame(&self, key: &str, config: &PhotoConfig) -> Option<Arc<FrameAsset>> {
        let mut cache = self.frame_cache.lock().ok()?;
        let ttl = Duration::from_secs(config.frame_cache_ttl_secs);

        let expired = match cache.get(key) {
            Some(entry) if entry.created_at.elapsed() <= ttl => {
                return Some(Arc::clone(&entry.frame));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            cache.pop(key);
        }
        None
    }

    fn store_cached_frame(&self, key: String, frame: Arc<FrameAsset>) {
        if let Ok(mut cache) = self.frame_cache.lock() {
            cache.put(
                key,
                CachedFrame {
                    created_at: Instant::now(),
                    frame,
                },
            );
        }
    }
}

fn build_http_client(config: &PhotoConfig) -> Result<reqwest::Client, PhotoError> {
    let allow_private_network = config.allow_private_network;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("重定向次数过多");
        }
        let blocked = !allow_private_network
            && attempt.url().host_str().is_some_and(is_blocked_host);
        if blocked {
            return attempt.error("禁止重定向到本地网络地址");
        }
        attempt.follow()
    });

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .redirect(redirect_policy)
        .build()
        .map_err(|e| PhotoError::Network(format!("无法创建 HTTP 客户端：{}", e)))
}

/// 执行一次带校验的流式下载。
async fn download_once(
    client: &reqwest::Client,
    url: &str,
    config: &PhotoConfig,
) -> Result<Vec<u8>, DownloadFailure> {
    log::debug!("📡 发送 HTTP 请求...");

    let mut response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "image/avif,image/webp,image/png,image/*,*/*;q=0.8")
        .send()
        .await
        .map_err(|e| DownloadFailure {
            retryable: is_retryable_network_error(&e),
            error: map_reqwest_error(e, url, config),
            retry_after_ms: None,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadFailure {
            error: PhotoError::Network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status_message(status.as_u16())
            )),
            retryable: is_retryable_http_status(status),
            retry_after_ms: retry_after_hint_ms(response.headers()),
        });
    }

    if let Some(content_type) = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
    {
        if !is_image_content_type(content_type) {
            return Err(DownloadFailure::fatal(PhotoError::InvalidFormat(format!(
                "不是图片类型：{}",
                content_type
            ))));
        }
    }

    if let Some(length) = response.content_length() {
        if length > config.max_file_size {
            return Err(DownloadFailure::fatal(PhotoError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                length as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            ))));
        }
    }

    let mut buffer = Vec::with_capacity(BUFFER_INITIAL_CAPACITY);
    loop {
        let chunk = response.chunk().await.map_err(|e| DownloadFailure {
            retryable: is_retryable_network_error(&e),
            error: map_reqwest_error(e, url, config),
            retry_after_ms: None,
        })?;

        let Some(chunk) = chunk else {
            break;
        };

        if (buffer.len() + chunk.len()) as u64 > config.max_file_size {
            return Err(DownloadFailure::fatal(PhotoError::ResourceLimit(
                "下载过程中文件超过大小限制".to_string(),
            )));
        }
        buffer.extend_from_slice(&chunk);
    }

    log::debug!("✅ 下载完成 - {} bytes", buffer.len());
    Ok(buffer)
}

/// 校验 URL 安全性。
///
/// 默认阻止本地/内网目标，防止 SSRF 风险。
pub(super) fn validate_url_safety(url: &str, config: &PhotoConfig) -> Result<(), PhotoError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| PhotoError::InvalidFormat(format!("URL 格式错误：{}", e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(PhotoError::InvalidFormat("仅支持 HTTP/HTTPS".to_string()));
    }

    if config.allow_private_network {
        return Ok(());
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| PhotoError::InvalidFormat("URL 缺少主机地址".to_string()))?;

    if is_blocked_host(host) {
        return Err(PhotoError::InvalidFormat(format!(
            "禁止访问本地网络地址：{}",
            host
        )));
    }

    Ok(())
}

fn is_blocked_host(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return is_private_or_local_ip(ip);
    }
    is_local_hostname(bare)
}

/// 判断主机名是否指向本地地址。
fn is_local_hostname(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host.eq_ignore_ascii_case("localhost.")
        || host.ends_with(".local")
}

/// 判断 IP 是否属于本地/内网/链路本地等受限范围。
fn is_private_or_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_local_ip(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

fn retry_after_hint_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1_000))
}

fn compute_retry_delay(attempt: u8, server_hint_ms: Option<u64>) -> u64 {
    let backoff = NETWORK_RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(6).saturating_sub(1));
    server_hint_ms
        .unwrap_or(backoff)
        .max(backoff)
        .min(NETWORK_RETRY_MAX_DELAY_MS)
}

fn is_retryable_http_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// 日志中去掉 query 与 fragment，避免签名参数泄露。
pub(crate) fn redact_url_for_log(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

/// 解析 Base64 输入（支持 Data URL / 纯 Base64）。
pub(crate) fn parse_base64(data: &str) -> Result<Vec<u8>, PhotoError> {
    parse_base64_with_limit(data, u64::MAX)
}

fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, PhotoError> {
    let len = base64_data.trim().len() as u64;
    let groups = len
        .checked_add(3)
        .ok_or_else(|| PhotoError::ResourceLimit("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| PhotoError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
}

fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, PhotoError> {
    let normalized = data.trim();

    let payload = if normalized.starts_with("data:") {
        if !normalized.starts_with("data:image/") {
            return Err(PhotoError::InvalidFormat("Data URL 不是图片类型".to_string()));
        }
        let base64_start = normalized
            .find(";base64,")
            .ok_or_else(|| PhotoError::InvalidFormat("缺少 base64 标记".to_string()))?;
        &normalized[base64_start + 8..]
    } else {
        normalized
    };

    let estimated_len = estimate_base64_decoded_upper_bound_len(payload)?;
    if estimated_len > max_file_size {
        return Err(PhotoError::ResourceLimit(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated_len as f64 / 1024.0 / 1024.0,
            max_file_size as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PhotoError::Decode(format!("Base64 解码失败：{}", e)))
}

/// 统一映射 reqwest 错误到业务错误。
fn map_reqwest_error(e: reqwest::Error, url: &str, config: &PhotoConfig) -> PhotoError {
    let redacted = redact_url_for_log(url);
    let err_msg = e.to_string().replace(url, &redacted);

    if e.is_timeout() {
        PhotoError::Timeout(format!("下载超时（{}秒）", config.download_timeout))
    } else if e.is_redirect() {
        PhotoError::InvalidFormat(format!("重定向被拒绝：{}", err_msg))
    } else if e.is_connect() {
        PhotoError::Network(format!("无法连接：{}", err_msg))
    } else {
        PhotoError::Network(format!("请求失败：{}", err_msg))
    }
}

fn is_retryable_network_error(error: &reqwest::Error) -> bool {
    if error.is_redirect() {
        return false;
    }
    if error.is_timeout() || error.is_connect() {
        return true;
    }

    let msg = error.to_string().to_lowercase();
    msg.contains("connection reset")
        || msg.contains("connection closed before message completed")
        || msg.contains("peer closed connection")
}

/// 常见 HTTP 状态码本地化文案。
fn status_message(code: u16) -> &'static str {
    match code {
        404 => "未找到",
        403 => "访问被拒绝（可能是跨域限制）",
        429 => "请求过于频繁",
        500..=599 => "服务器错误",
        _ => "请求失败",
    }
}

/// 通过文件签名（magic bytes）校验输入是否为图片。
pub(super) fn validate_image_signature(bytes: &[u8]) -> Result<(), PhotoError> {
    if bytes.is_empty() {
        return Err(PhotoError::InvalidFormat("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| PhotoError::InvalidFormat("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(PhotoError::InvalidFormat(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoConfig;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::{Cursor, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, 90, 255])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn local_config() -> PhotoConfig {
        let mut config = PhotoConfig::default();
        config.allow_private_network = true;
        config
    }

    /// 启动只处理 `connections` 次请求的本地 HTTP 服务。
    fn spawn_server(
        connections: usize,
        status_line: &'static str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> (u16, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
        let port = listener.local_addr().expect("read local addr failed").port();

        let handle = thread::spawn(move || {
            for _ in 0..connections {
                let (mut stream, _) = listener.accept().expect("accept failed");
                let mut req_buf = [0u8; 2048];
                let _ = stream.read(&mut req_buf);

                let headers = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status_line,
                    content_type,
                    body.len()
                );
                stream.write_all(headers.as_bytes()).expect("write headers failed");
                stream.write_all(&body).expect("write body failed");
                stream.flush().expect("flush failed");
            }
        });

        (port, handle)
    }

    #[test]
    fn url_safety_blocks_private_targets_by_default() {
        let config = PhotoConfig::default();

        assert!(matches!(
            validate_url_safety("http://127.0.0.1/frame.png", &config),
            Err(PhotoError::InvalidFormat(_))
        ));
        assert!(matches!(
            validate_url_safety("https://localhost/frame.png", &config),
            Err(PhotoError::InvalidFormat(_))
        ));
        assert!(matches!(
            validate_url_safety("http://[::1]/frame.png", &config),
            Err(PhotoError::InvalidFormat(_))
        ));
        assert!(matches!(
            validate_url_safety("ftp://example.com/frame.png", &config),
            Err(PhotoError::InvalidFormat(_))
        ));
        assert!(validate_url_safety("https://ik.imagekit.io/demo/frame.png", &config).is_ok());
    }

    #[test]
    fn url_safety_allows_private_targets_when_enabled() {
        assert!(validate_url_safety("http://127.0.0.1/frame.png", &local_config()).is_ok());
    }

    #[test]
    fn load_from_base64_rejects_non_image_payload() {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler init failed");
        let result = handler.load_from_base64("SGVsbG8=", &PhotoConfig::default());

        assert!(matches!(result, Err(PhotoError::InvalidFormat(_))));
    }

    #[test]
    fn load_from_base64_accepts_camera_data_uri() {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler init failed");
        let png = create_png_bytes(4, 3);
        let data_uri = format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&png));

        let raw = handler
            .load_from_base64(&data_uri, &PhotoConfig::default())
            .expect("data uri should load");
        assert_eq!(raw.bytes, png);
        assert_eq!(raw.source_hint, "base64");
    }

    #[test]
    fn parse_base64_with_limit_rejects_large_payload_before_decode() {
        let huge = "A".repeat(1024 * 1024);
        let result = parse_base64_with_limit(&huge, 32);

        assert!(matches!(result, Err(PhotoError::ResourceLimit(_))));
    }

    #[test]
    fn parse_base64_rejects_non_image_data_url() {
        let result = parse_base64("data:text/plain;base64,SGVsbG8=");
        assert!(matches!(result, Err(PhotoError::InvalidFormat(_))));
    }

    #[test]
    fn load_from_file_reports_missing_file() {
        let handler = PhotoHandler::new(PhotoConfig::default()).expect("handler init failed");
        let result = handler.load_from_file("/definitely/not/here.png", &PhotoConfig::default());

        assert!(matches!(result, Err(PhotoError::FileSystem(_))));
    }

    #[test]
    fn content_type_parser_accepts_image_with_params() {
        assert!(is_image_content_type("image/png; charset=utf-8"));
        assert!(is_image_content_type("IMAGE/JPEG"));
        assert!(!is_image_content_type("text/html; charset=utf-8"));
    }

    #[test]
    fn retryable_http_status_is_expected() {
        assert!(is_retryable_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_http_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_http_status(reqwest::StatusCode::FORBIDDEN));
    }

    #[test]
    fn retry_delay_grows_and_is_capped() {
        assert_eq!(compute_retry_delay(1, None), NETWORK_RETRY_BASE_DELAY_MS);
        assert_eq!(compute_retry_delay(2, None), NETWORK_RETRY_BASE_DELAY_MS * 2);
        assert_eq!(compute_retry_delay(1, Some(60_000)), NETWORK_RETRY_MAX_DELAY_MS);
    }

    #[test]
    fn redact_url_for_log_removes_query_and_fragment() {
        let redacted =
            redact_url_for_log("https://ik.imagekit.io/demo/frame.png?ik-s=abc123#hash");
        assert_eq!(redacted, "https://ik.imagekit.io/demo/frame.png");
    }

    #[tokio::test]
    async fn load_from_url_rejects_non_image_body_even_when_content_type_is_image() {
        let (port, server) = spawn_server(1, "200 OK", "image/png", b"hello world".to_vec());
        let handler = PhotoHandler::new(local_config()).expect("handler init failed");

        let url = format!("http://127.0.0.1:{}/fake.png", port);
        let result = handler.load_from_url(&url, &local_config()).await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(PhotoError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn load_from_url_rejects_forbidden_without_retry() {
        let (port, server) = spawn_server(1, "403 Forbidden", "text/plain", b"denied".to_vec());
        let handler = PhotoHandler::new(local_config()).expect("handler init failed");

        let url = format!("http://127.0.0.1:{}/frame.png", port);
        let result = handler.load_from_url(&url, &local_config()).await;
        server.join().expect("server thread failed");

        assert!(matches!(result, Err(PhotoError::Network(ref m)) if m.contains("403")));
    }

    #[tokio::test]
    async fn load_frame_is_served_from_cache_on_second_call() {
        let png = create_png_bytes(9, 16);
        // 只接受一次连接：第二次加载必须命中缓存
        let (port, server) = spawn_server(1, "200 OK", "image/png", png);
        let handler = PhotoHandler::new(local_config()).expect("handler init failed");

        let source = PhotoSource::Url(format!("http://127.0.0.1:{}/frame.png", port));
        let first = handler.load_frame(&source).await.expect("first load");
        server.join().expect("server thread failed");
        let second = handler.load_frame(&source).await.expect("cached load");

        assert_eq!((first.width(), first.height()), (9, 16));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
