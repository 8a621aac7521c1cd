//! Extraction settings with JSON persistence.

/// Tunables shared by bulk extraction and scan contexts.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Bulk batch size used when a caller passes zero.
    pub max_spots: usize,
    /// Upper bound applied to the batch size of bulk point extraction.
    pub max_spots_limit: usize,
    /// Batch size used by a scan context created with a zero batch size.
    pub scan_max_spots: usize,
    /// Deliver a check-stop sentinel after this many batches.
    pub check_stop_interval: Option<usize>,
    /// Distance under which two stations along a hull are treated as equal.
    pub point_tolerance: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_spots: 1000,
            max_spots_limit: 50_000,
            scan_max_spots: 100_000,
            check_stop_interval: None,
            point_tolerance: 1e-4,
        }
    }
}

impl ExtractConfig {
    /// Batch size for bulk extraction: zero selects `max_spots`, then the
    /// size is clamped to `[1, max_spots_limit]` and to the number of points
    /// in the model.
    pub fn bulk_batch_size(&self, requested: usize, num_points: usize) -> usize {
        let requested = if requested == 0 {
            self.max_spots
        } else {
            requested
        };
        requested
            .min(self.max_spots_limit)
            .min(num_points)
            .max(1)
    }

    /// Batch size for a scan context: zero selects `scan_max_spots`.
    pub fn scan_batch_size(&self, requested: usize) -> usize {
        if requested == 0 {
            self.scan_max_spots
        } else {
            requested
        }
    }

    /// Saves this configuration to a JSON file.
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Loads a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn load(path: &str) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: ExtractConfig = serde_json::from_str(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_clamping() {
        let c = ExtractConfig::default();
        assert_eq!(c.bulk_batch_size(0, 10), 10);
        assert_eq!(c.bulk_batch_size(0, 5000), 1000);
        assert_eq!(c.bulk_batch_size(1, 10), 1);
        assert_eq!(c.bulk_batch_size(4, 10), 4);
        assert_eq!(c.bulk_batch_size(400, 10), 10);
        assert_eq!(c.bulk_batch_size(80_000, 1_000_000), 50_000);
        assert_eq!(c.scan_batch_size(0), 100_000);
        assert_eq!(c.scan_batch_size(7), 7);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "check_stop_interval": 5 }"#).unwrap();
        let c = ExtractConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(c.check_stop_interval, Some(5));
        assert_eq!(c.max_spots_limit, 50_000);
    }
}
