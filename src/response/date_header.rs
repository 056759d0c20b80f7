use std::time::{SystemTime, UNIX_EPOCH};

use httpdate::HttpDate;

/// Fixed length date and time in bytes e.g. Mon, 29 Jan 2024 22:13:01 GMT
const DATE_TIME_SAMPLE: &[u8; 29] = b"Mon, 29 Jan 2024 22:13:01 GMT";

/// `Date` value cache, reformatted at most once per second
pub(crate) struct DateHeader {
    second: u64,
    value: [u8; DATE_TIME_SAMPLE.len()],
}

impl DateHeader {
    pub(crate) fn new() -> Self {
        Self {
            second: u64::MAX,
            value: *DATE_TIME_SAMPLE,
        }
    }

    /// Current http date and time
    pub(crate) fn current(&mut self) -> &str {
        self.at(SystemTime::now())
    }

    fn at(&mut self, now: SystemTime) -> &str {
        let second = now
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        if second != self.second {
            let http_date = HttpDate::from(now).to_string();
            if http_date.len() == self.value.len() {
                self.value.copy_from_slice(http_date.as_bytes());
                self.second = second;
            }
        }
        // only ever filled from ascii
        std::str::from_utf8(&self.value).unwrap_or_default()
    }
}

impl std::fmt::Debug for DateHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateHeader")
            .field("second", &self.second)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn date_header_test() {
        let mut dh = DateHeader::new();
        let epoch = UNIX_EPOCH + Duration::from_secs(1_706_566_381);
        assert_eq!(dh.at(epoch), "Mon, 29 Jan 2024 22:13:01 GMT");

        let same_second = epoch + Duration::from_millis(999);
        assert_eq!(dh.at(same_second), "Mon, 29 Jan 2024 22:13:01 GMT");

        let next = epoch + Duration::from_secs(1);
        assert_eq!(dh.at(next), "Mon, 29 Jan 2024 22:13:02 GMT");

        assert_eq!(dh.current().len(), DATE_TIME_SAMPLE.len());
        assert!(dh.current().ends_with(" GMT"));
    }
}
