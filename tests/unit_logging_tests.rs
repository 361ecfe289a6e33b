//! # Logging Context Unit Tests / 日志上下文单元测试

use assert_runner::infra::logging::{timestamped_log_path, CaptureBuffer, LogContext, LOG_FILE_NAME};
use chrono::{Local, TimeZone};
use std::path::Path;
use tracing::{debug, info, warn, Level};

#[cfg(test)]
mod logging_tests {
    use super::*;

    #[test]
    fn test_capture_respects_level() {
        let buffer = CaptureBuffer::new();
        let logging = LogContext::builder()
            .capture(buffer.clone(), Level::INFO)
            .build()
            .unwrap();

        logging.in_scope(|| {
            debug!("hidden detail");
            info!("checkout started");
            warn!("cleanup failed");
        });

        let contents = buffer.contents();
        assert!(contents.contains("checkout started"));
        assert!(contents.contains("cleanup failed"));
        assert!(!contents.contains("hidden detail"));
    }

    #[test]
    fn test_events_outside_scope_are_not_captured() {
        let buffer = CaptureBuffer::new();
        let logging = LogContext::builder()
            .capture(buffer.clone(), Level::TRACE)
            .build()
            .unwrap();

        info!("before");
        {
            let _guard = logging.enter();
            info!("inside");
        }
        info!("after");

        let contents = buffer.contents();
        assert!(contents.contains("inside"));
        assert!(!contents.contains("before"));
        assert!(!contents.contains("after"));
    }

    #[tokio::test]
    async fn test_scoped_future_logs_through_context() {
        let buffer = CaptureBuffer::new();
        let logging = LogContext::builder()
            .capture(buffer.clone(), Level::DEBUG)
            .build()
            .unwrap();

        let value = logging
            .scope(async {
                tokio::task::yield_now().await;
                debug!("after yield");
                7
            })
            .await;

        assert_eq!(value, 7);
        assert!(buffer.contents().contains("after yield"));
    }

    #[test]
    fn test_log_file_is_renamed_with_start_time() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let start = Local.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();

        let logging = LogContext::builder().file(&logs, Level::DEBUG).build().unwrap();
        assert_eq!(logging.log_file(), Some(logs.join(LOG_FILE_NAME).as_path()));
        logging.in_scope(|| info!("written to file"));

        let renamed = logging.finish(start).unwrap().unwrap();
        assert_eq!(renamed, logs.join("assert_2024-03-05_07-08-09.log"));
        assert!(!logs.join(LOG_FILE_NAME).exists());
        assert!(std::fs::read_to_string(&renamed).unwrap().contains("written to file"));
    }

    #[test]
    fn test_disabled_context_has_no_file() {
        let logging = LogContext::disabled();
        assert!(logging.log_file().is_none());
        assert_eq!(logging.finish(Local::now()).unwrap(), None);
    }

    #[test]
    fn test_timestamped_path_stays_in_directory() {
        let start = Local.with_ymd_and_hms(2023, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(
            timestamped_log_path(Path::new("/var/log/assert/assert.log"), start),
            Path::new("/var/log/assert/assert_2023-12-31_23-59-00.log")
        );
    }
}
