//! Annotation Metadata Adapters
//!
//! Reads hostpath classification, mount bookkeeping and node disk
//! partitions from object annotations written by the node agents.

use crate::domain::ports::{
    DiskPartition, MountRecord, NodeDiskProvider, RetentionMode, SharingMode, VolumeClass,
    VolumeMetadataReader,
};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{Node, PersistentVolume};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};

// =============================================================================
// Annotation Keys
// =============================================================================

/// Retention policy of a hostpath volume: `keep` or `none`
pub const MOUNT_POLICY_ANNOTATION: &str = "hostpath.scheduler.io/mount-policy";

/// Whether each pod gets its own quota directory: `true` or `false`
pub const QUOTA_FOR_ONE_POD_ANNOTATION: &str = "hostpath.scheduler.io/quota-for-one-pod";

/// JSON list of the volume's directories on nodes
pub const MOUNT_LIST_ANNOTATION: &str = "hostpath.scheduler.io/mount-list";

/// JSON list of the node's quota partitions
pub const DISK_INFO_ANNOTATION: &str = "hostpath.scheduler.io/disk-info";

// =============================================================================
// Wire Types
// =============================================================================

/// One entry of the mount-list annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountListEntry {
    #[serde(default)]
    pub host_path: String,
    pub node_name: String,
    #[serde(default)]
    pub volume_quota_size: u64,
}

impl From<MountListEntry> for MountRecord {
    fn from(entry: MountListEntry) -> Self {
        MountRecord {
            host_path: if entry.host_path.is_empty() {
                None
            } else {
                Some(entry.host_path)
            },
            node_name: entry.node_name,
            quota_bytes: entry.volume_quota_size,
            empty: false,
        }
    }
}

// =============================================================================
// Volume Reader
// =============================================================================

/// Reads hostpath volume metadata from PersistentVolume annotations
#[derive(Debug, Clone, Default)]
pub struct AnnotationVolumeReader;

impl AnnotationVolumeReader {
    pub fn new() -> Self {
        Self
    }
}

impl VolumeMetadataReader for AnnotationVolumeReader {
    fn is_hostpath(&self, pv: &PersistentVolume) -> bool {
        pv.spec
            .as_ref()
            .map(|spec| spec.host_path.is_some())
            .unwrap_or(false)
    }

    fn classify(&self, pv: &PersistentVolume) -> Result<VolumeClass> {
        let annotations = pv.annotations();

        let retention = match annotations.get(MOUNT_POLICY_ANNOTATION).map(|v| v.trim()) {
            None | Some("") | Some("none") => RetentionMode::Ephemeral,
            Some("keep") => RetentionMode::Keep,
            Some(other) => {
                return Err(Error::Classification {
                    volume: pv.name_any(),
                    reason: format!("unknown mount policy {:?}", other),
                })
            }
        };

        let sharing = match annotations
            .get(QUOTA_FOR_ONE_POD_ANNOTATION)
            .map(|v| v.trim().to_lowercase())
            .as_deref()
        {
            None | Some("") | Some("false") => SharingMode::Shared,
            Some("true") => SharingMode::Exclusive,
            Some(other) => {
                return Err(Error::Classification {
                    volume: pv.name_any(),
                    reason: format!("unknown quota-for-one-pod value {:?}", other),
                })
            }
        };

        Ok(VolumeClass::new(sharing, retention))
    }

    fn capacity(&self, pv: &PersistentVolume) -> Result<u64> {
        let storage = pv
            .spec
            .as_ref()
            .and_then(|spec| spec.capacity.as_ref())
            .and_then(|capacity| capacity.get("storage"));

        match storage {
            Some(quantity) => parse_quantity(&quantity.0),
            None => Ok(0),
        }
    }

    fn mount_records(&self, pv: &PersistentVolume) -> Result<Vec<MountRecord>> {
        let Some(raw) = pv.annotations().get(MOUNT_LIST_ANNOTATION) else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<MountListEntry> =
            serde_json::from_str(raw).map_err(|e| Error::InvalidAnnotation {
                object: format!("PersistentVolume/{}", pv.name_any()),
                key: MOUNT_LIST_ANNOTATION.into(),
                reason: e.to_string(),
            })?;

        Ok(entries.into_iter().map(MountRecord::from).collect())
    }
}

// =============================================================================
// Node Disk Provider
// =============================================================================

/// Reads quota partitions from the node's disk-info annotation
#[derive(Debug, Clone, Default)]
pub struct AnnotationDiskProvider;

impl AnnotationDiskProvider {
    pub fn new() -> Self {
        Self
    }
}

impl NodeDiskProvider for AnnotationDiskProvider {
    fn partitions(&self, node: &Node) -> Result<Vec<DiskPartition>> {
        let Some(raw) = node.annotations().get(DISK_INFO_ANNOTATION) else {
            return Ok(Vec::new());
        };

        serde_json::from_str(raw).map_err(|e| Error::NodeDiskInfo {
            node: node.name_any(),
            reason: format!("invalid {} annotation: {}", DISK_INFO_ANNOTATION, e),
        })
    }
}

// =============================================================================
// Quantity Parsing
// =============================================================================

/// Parse a Kubernetes quantity string (e.g., "100Gi", "500M", "1024") to bytes
pub fn parse_quantity(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::CapacityParse("empty quantity string".into()));
    }

    // Find where the number ends and the suffix begins
    let num_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let num_str = &s[..num_end];
    let suffix = &s[num_end..];

    let num: f64 = num_str
        .parse()
        .map_err(|_| Error::CapacityParse(format!("invalid number: {}", s)))?;

    let multiplier: u64 = match suffix {
        "" => 1,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "P" => 1_000_000_000_000_000,
        "E" => 1_000_000_000_000_000_000,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        "Pi" => 1 << 50,
        "Ei" => 1 << 60,
        _ => {
            return Err(Error::CapacityParse(format!(
                "unknown suffix {:?} in {}",
                suffix, s
            )))
        }
    };

    Ok((num * multiplier as f64).ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hostpath_pv, node_with_disks, MountSpec};
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("100").unwrap(), 100);
        assert_eq!(parse_quantity("1k").unwrap(), 1000);
        assert_eq!(parse_quantity("1Ki").unwrap(), 1024);
        assert_eq!(parse_quantity("5M").unwrap(), 5_000_000);
        assert_eq!(parse_quantity("1Gi").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_quantity("100Gi").unwrap(), 100 * 1024 * 1024 * 1024);
        assert_eq!(parse_quantity("1.5Ki").unwrap(), 1536);
        assert_eq!(parse_quantity("2T").unwrap(), 2_000_000_000_000);

        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("100X").is_err());
    }

    #[test]
    fn test_classify_defaults_to_shared_ephemeral() {
        let mut pv = hostpath_pv("pv-1", SharingMode::Shared, RetentionMode::Ephemeral, 0, &[]);
        pv.metadata.annotations = Some(BTreeMap::new());

        let class = AnnotationVolumeReader::new().classify(&pv).unwrap();
        assert_eq!(class.sharing, SharingMode::Shared);
        assert_eq!(class.retention, RetentionMode::Ephemeral);
    }

    #[test]
    fn test_classify_exclusive_keep() {
        let pv = hostpath_pv("pv-1", SharingMode::Exclusive, RetentionMode::Keep, 0, &[]);
        let class = AnnotationVolumeReader::new().classify(&pv).unwrap();
        assert_eq!(class, VolumeClass::new(SharingMode::Exclusive, RetentionMode::Keep));
    }

    #[test]
    fn test_classify_rejects_unknown_policy() {
        let mut pv = hostpath_pv("pv-1", SharingMode::Shared, RetentionMode::Keep, 0, &[]);
        pv.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(MOUNT_POLICY_ANNOTATION.into(), "sometimes".into());

        let err = AnnotationVolumeReader::new().classify(&pv).unwrap_err();
        assert_matches!(err, Error::Classification { .. });
        assert!(err.is_upstream());
    }

    #[test]
    fn test_mount_records_from_annotation() {
        let pv = hostpath_pv(
            "pv-1",
            SharingMode::Exclusive,
            RetentionMode::Keep,
            1024,
            &[
                MountSpec::at("node-a", "/xfs/disk1/pv-1", 512),
                MountSpec::unknown_path("node-b", 256),
            ],
        );

        let reader = AnnotationVolumeReader::new();
        let records = reader.mount_records(&pv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].host_path.as_deref(), Some("/xfs/disk1/pv-1"));
        assert_eq!(records[0].node_name, "node-a");
        assert_eq!(records[0].quota_bytes, 512);
        assert_eq!(records[1].host_path, None);
        assert!(records.iter().all(|r| !r.empty));
        assert_eq!(reader.capacity(&pv).unwrap(), 1024);
        assert!(reader.is_hostpath(&pv));
    }

    #[test]
    fn test_malformed_mount_list() {
        let mut pv = hostpath_pv("pv-1", SharingMode::Shared, RetentionMode::Keep, 0, &[]);
        pv.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(MOUNT_LIST_ANNOTATION.into(), "{not json".into());

        let err = AnnotationVolumeReader::new().mount_records(&pv).unwrap_err();
        assert_matches!(err, Error::InvalidAnnotation { .. });
    }

    #[test]
    fn test_node_partitions() {
        let node = node_with_disks("node-a", &[("/xfs/disk1", 100, false), ("/xfs/disk2", 50, true)]);
        let partitions = AnnotationDiskProvider::new().partitions(&node).unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[1].mount_path, "/xfs/disk2");
        assert!(partitions[1].disabled);

        let mut bare = node_with_disks("node-b", &[]);
        bare.metadata.annotations = None;
        assert!(AnnotationDiskProvider::new().partitions(&bare).unwrap().is_empty());
    }
}
