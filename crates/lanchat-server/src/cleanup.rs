use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::storage::Storage;

/// Background task that prunes expired uploads.
///
/// The first pass runs immediately on startup, then once per `every`.
/// History retention is swept by the engine on the same interval.
pub async fn run_cleanup_loop(storage: Arc<Storage>, retention: Duration, every: Duration) {
    if retention.is_zero() || every.is_zero() {
        info!("Upload cleanup disabled");
        return;
    }
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match storage.delete_older_than(retention, SystemTime::now()).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} expired uploads", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
