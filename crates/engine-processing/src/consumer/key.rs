use chrono::{DateTime, Utc};
use model::{
    core::{
        identifiers::{ClientCode, EntityName},
        time::{date_partitions, iso_millis},
    },
    requests::window::WindowMessage,
};

/// Everything a part's object key is derived from. Fixed for one dump
/// invocation; only the part index varies.
#[derive(Debug, Clone)]
pub struct PartKeys {
    prefix: String,
    stem: String,
}

impl PartKeys {
    pub fn new(
        microservice: &str,
        client: &ClientCode,
        window: &WindowMessage,
        pushed_at: DateTime<Utc>,
    ) -> Self {
        let entity: EntityName = window.entity_name();
        let (year, month, day) = date_partitions(&pushed_at);
        let prefix = format!(
            "microservice={microservice}/entity={entity}/load_type={}/client_code={client}/year={year}/month={month}/day={day}",
            window.load_type()
        );
        let stem = format!("{}-{}", iso_millis(&window.from), pushed_at.timestamp_millis());
        Self { prefix, stem }
    }

    /// Key of part `index` (1-based).
    pub fn part(&self, index: u32) -> String {
        format!("{}/{}-{index:03}.ndjson.gz", self.prefix, self.stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::requests::window::LoadType;

    #[test]
    fn hive_style_layout() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 1, 23, 59, 59).unwrap();
        let window = WindowMessage::new(&EntityName::new("Order Item"), LoadType::Initial, from, to);
        let pushed_at = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();

        let keys = PartKeys::new("oms", &ClientCode::from("acme"), &window, pushed_at);
        assert_eq!(
            keys.part(1),
            format!(
                "microservice=oms/entity=order-item/load_type=initial/client_code=acme/year=2026/month=03/day=05/2026-01-01T00:00:00.000Z-{}-001.ndjson.gz",
                pushed_at.timestamp_millis()
            )
        );
        assert!(keys.part(12).ends_with("-012.ndjson.gz"));
    }
}
