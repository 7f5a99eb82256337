// SPDX-License-Identifier: GPL-3.0-only

//! ZFS pool import, unlock and dataset mounting

use std::path::Path;

use installer_sys::Host;
use installer_types::{PartitionDescriptor, ZfsDatasetInfo, ZfsEncryptionInfo, ZfsPoolInfo};
use tracing::info;

use crate::error::{MountError, Result};

/// Pool, dataset and encryption metadata left behind by partitioning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZfsMetadata {
    pub pools: Vec<ZfsPoolInfo>,
    pub datasets: Vec<ZfsDatasetInfo>,
    pub encryption: Vec<ZfsEncryptionInfo>,
}

impl ZfsMetadata {
    pub fn pool_for(&self, mount_point: &str) -> Option<&ZfsPoolInfo> {
        self.pools.iter().find(|pool| pool.mountpoint == mount_point)
    }

    pub fn encryption_for(&self, mount_point: &str) -> Option<&ZfsEncryptionInfo> {
        self.encryption
            .iter()
            .find(|info| info.mountpoint == mount_point && info.encrypted)
    }

    /// Datasets of `pool` in mount point order, parents first
    pub fn datasets_in(&self, pool: &str) -> Vec<&ZfsDatasetInfo> {
        let mut datasets: Vec<&ZfsDatasetInfo> = self
            .datasets
            .iter()
            .filter(|dataset| dataset.zpool == pool)
            .collect();
        datasets.sort_by(|a, b| a.mountpoint.cmp(&b.mountpoint));
        datasets
    }
}

/// Import the pool behind `partition`, unlock it if needed and mount its
/// datasets under `root_mount_point`.
///
/// The pool keeps its own mount state; nothing is added to the ledger.
pub fn mount_zfs(
    host: &dyn Host,
    root_mount_point: &Path,
    partition: &PartitionDescriptor,
    zfs: &ZfsMetadata,
) -> Result<()> {
    let Some(pool) = zfs.pool_for(&partition.mount_point) else {
        return Err(MountError::Precondition(format!(
            "no zfsPoolInfo entry for {}",
            partition.mount_point
        )));
    };

    let root = root_mount_point.to_string_lossy().into_owned();
    info!("Importing zpool {} at {}", pool.pool_name, root);
    host.run("zpool", &["import", "-N", "-R", root.as_str(), pool.pool_name.as_str()], None)
        .map_err(|e| MountError::command("Failed to import zpool", e))?;

    if let Some(encryption) = zfs.encryption_for(&partition.mount_point) {
        let Some(passphrase) = encryption.passphrase.as_deref() else {
            return Err(MountError::Precondition(format!(
                "no passphrase for encrypted zpool {}",
                pool.pool_name
            )));
        };
        info!("Unlocking zpool {}", pool.pool_name);
        host.run("zfs", &["load-key", pool.pool_name.as_str()], Some(passphrase))
            .map_err(|e| MountError::command("Failed to unlock zpool", e))?;
    }

    if partition.mount_point == "/" {
        let datasets = zfs.datasets_in(&pool.pool_name);
        if datasets.is_empty() {
            return Err(MountError::Precondition(format!(
                "no zfs datasets listed for pool {}",
                pool.pool_name
            )));
        }

        for dataset in datasets
            .into_iter()
            .filter(|dataset| dataset.can_mount.needs_explicit_mount())
        {
            mount_dataset(host, &dataset.full_name())?;
        }
    } else {
        mount_dataset(host, &format!("{}/{}", pool.pool_name, pool.ds_name))?;
    }

    Ok(())
}

fn mount_dataset(host: &dyn Host, name: &str) -> Result<()> {
    info!("Mounting zfs dataset {}", name);
    host.run("zfs", &["mount", name], None)
        .map(|_| ())
        .map_err(|e| MountError::command("Failed to set zfs mountpoint", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use installer_testing::FakeHost;
    use installer_types::CanMount;

    fn metadata() -> ZfsMetadata {
        ZfsMetadata {
            pools: vec![
                ZfsPoolInfo {
                    mountpoint: "/".to_string(),
                    pool_name: "zroot".to_string(),
                    ds_name: "ROOT/distro".to_string(),
                },
                ZfsPoolInfo {
                    mountpoint: "/data".to_string(),
                    pool_name: "zdata".to_string(),
                    ds_name: "data".to_string(),
                },
            ],
            datasets: vec![
                dataset("zroot", "ROOT/distro/home", "/home", CanMount::Flag(true)),
                dataset("zroot", "ROOT/distro/root", "/", CanMount::Mode("noauto".to_string())),
                dataset("zroot", "ROOT", "none", CanMount::Mode("off".to_string())),
                dataset("zdata", "data", "/data", CanMount::Flag(true)),
            ],
            encryption: vec![],
        }
    }

    fn dataset(pool: &str, name: &str, mountpoint: &str, can_mount: CanMount) -> ZfsDatasetInfo {
        ZfsDatasetInfo {
            zpool: pool.to_string(),
            ds_name: name.to_string(),
            mountpoint: mountpoint.to_string(),
            can_mount,
        }
    }

    fn partition(mount_point: &str) -> PartitionDescriptor {
        PartitionDescriptor {
            device: "/dev/sda2".to_string(),
            fs: "zfs".to_string(),
            mount_point: mount_point.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn root_pool_mounts_datasets_parents_first() {
        let host = FakeHost::new();
        mount_zfs(&host, Path::new("/t"), &partition("/"), &metadata()).unwrap();

        assert_eq!(
            host.commands(),
            vec![
                "zpool import -N -R /t zroot".to_string(),
                "zfs mount zroot/ROOT/distro/root".to_string(),
                "zfs mount zroot/ROOT/distro/home".to_string(),
            ]
        );
    }

    #[test]
    fn non_root_pool_mounts_its_single_dataset() {
        let host = FakeHost::new();
        mount_zfs(&host, Path::new("/t"), &partition("/data"), &metadata()).unwrap();

        assert_eq!(
            host.commands(),
            vec![
                "zpool import -N -R /t zdata".to_string(),
                "zfs mount zdata/data".to_string(),
            ]
        );
    }

    #[test]
    fn encrypted_pool_is_unlocked_with_passphrase() {
        let host = FakeHost::new();
        let mut zfs = metadata();
        zfs.encryption.push(ZfsEncryptionInfo {
            mountpoint: "/data".to_string(),
            encrypted: true,
            passphrase: Some("hunter2".to_string()),
        });

        mount_zfs(&host, Path::new("/t"), &partition("/data"), &zfs).unwrap();

        assert_eq!(host.commands()[1], "zfs load-key zdata");
        assert_eq!(host.stdin_for("zfs load-key"), vec!["hunter2".to_string()]);
    }

    #[test]
    fn missing_pool_is_an_internal_error() {
        let host = FakeHost::new();
        let error = mount_zfs(&host, Path::new("/t"), &partition("/srv"), &metadata()).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ProtocolPrecondition);
        assert!(host.commands().is_empty());
    }

    #[test]
    fn command_failures_carry_protocol_message() {
        let host = FakeHost::new();
        host.fail_command("zpool import -N -R /t zroot");
        let error = mount_zfs(&host, Path::new("/t"), &partition("/"), &metadata()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::CommandFailure);
        assert!(error.to_string().starts_with("Failed to import zpool"));

        let host = FakeHost::new();
        host.fail_command("zfs mount zroot/ROOT/distro/home");
        let error = mount_zfs(&host, Path::new("/t"), &partition("/"), &metadata()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to set zfs mountpoint"));
    }

    #[test]
    fn unlock_failure_is_fatal() {
        let host = FakeHost::new();
        host.fail_command("zfs load-key zroot");
        let mut zfs = metadata();
        zfs.encryption.push(ZfsEncryptionInfo {
            mountpoint: "/".to_string(),
            encrypted: true,
            passphrase: Some("secret".to_string()),
        });

        let error = mount_zfs(&host, Path::new("/t"), &partition("/"), &zfs).unwrap_err();
        assert!(error.to_string().starts_with("Failed to unlock zpool"));
        assert_eq!(host.commands().len(), 2);
    }
}
