//! Wall-clock time and task sleeping.

use std::time::{Duration, SystemTime};

use super::RealRuntime;

impl RealRuntime {
    pub(crate) fn now_impl(&self) -> SystemTime {
        SystemTime::now()
    }

    pub(crate) async fn sleep_impl(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
