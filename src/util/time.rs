use std::time::{SystemTime, UNIX_EPOCH};

pub fn get_u64_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock to be after the epoch")
        .as_millis() as u64
}
