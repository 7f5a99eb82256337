// SPDX-License-Identifier: GPL-3.0-only

//! Mounting a single partition or extra mount

use std::fs;
use std::path::{Path, PathBuf};

use installer_sys::{Host, SysError};
use installer_types::{PartitionDescriptor, fs_kind};
use tracing::{debug, info, warn};

use crate::btrfs::mount_btrfs_root;
use crate::config::JobConfig;
use crate::context::Publication;
use crate::error::{MountError, Result};
use crate::ledger::ActiveMounts;
use crate::options::resolve_mount_options;
use crate::zfs::{ZfsMetadata, mount_zfs};

/// Filesystems only tolerated on the boot partitions
const LEGACY_KINDS: &[&str] = &[
    fs_kind::FAT16,
    fs_kind::FAT32,
    fs_kind::EXFAT,
    fs_kind::NTFS,
    fs_kind::EXT2,
];

const BOOT_MOUNT_POINTS: &[&str] = &["/boot", "/boot/efi"];

/// Everything the per-partition protocol reads but never changes
pub struct MountEnv<'a> {
    pub host: &'a dyn Host,
    pub config: &'a JobConfig,
    pub root_mount_point: &'a Path,
    /// Where scratch mounts are created; the system temp dir when `None`
    pub scratch_parent: Option<&'a Path>,
    /// EFI system partition mount point, set on EFI firmware only
    pub efi_location: Option<&'a str>,
    pub efi_capable: bool,
    /// Physical partitions of the install, for the Btrfs layout filter
    pub partitions: &'a [PartitionDescriptor],
    pub zfs: &'a ZfsMetadata,
    pub swap_is_file: bool,
}

impl MountEnv<'_> {
    /// Absolute destination of `mount_point` inside the install root
    pub fn target_path(&self, mount_point: &str) -> PathBuf {
        join_under(self.root_mount_point, mount_point)
    }
}

/// `base` + `path`, treating `path` as relative even when it starts with `/`
pub(crate) fn join_under(base: &Path, path: &str) -> PathBuf {
    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

/// What the protocol does with one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountAction {
    Skip,
    Zfs,
    /// Btrfs at `/`: create subvolumes, then mount them
    BtrfsRoot,
    /// Plain mount with the given (normalised) filesystem kind
    Direct { fs: String },
}

/// Decide how to mount `partition`, rejecting filesystems that cannot
/// live where they are placed.
pub fn classify(partition: &PartitionDescriptor, efi_capable: bool) -> Result<MountAction> {
    let fs = partition.fs_kind();
    if !partition.has_mount_point() || fs == fs_kind::UNFORMATTED {
        return Ok(MountAction::Skip);
    }

    let fs = if LEGACY_KINDS.contains(&fs.as_str()) {
        check_legacy_placement(&fs, &partition.mount_point, efi_capable)?;
        if fs == fs_kind::EXFAT {
            fs
        } else {
            fs_kind::VFAT.to_string()
        }
    } else {
        fs
    };

    Ok(match fs.as_str() {
        fs_kind::ZFS => MountAction::Zfs,
        fs_kind::BTRFS if partition.mount_point == "/" => MountAction::BtrfsRoot,
        _ => MountAction::Direct { fs },
    })
}

fn check_legacy_placement(fs: &str, mount_point: &str, efi_capable: bool) -> Result<()> {
    let on_boot = BOOT_MOUNT_POINTS.contains(&mount_point);
    let never = fs == fs_kind::NTFS || fs == fs_kind::EXT2;
    let exfat_on_efi = fs == fs_kind::EXFAT && efi_capable;

    if !on_boot || never || exfat_on_efi {
        return Err(MountError::UnsupportedFilesystem {
            fs: fs.to_string(),
            mount_point: mount_point.to_string(),
        });
    }
    Ok(())
}

/// Mount one partition inside the install root.
///
/// Successful mounts are appended to `ledger` and their options to
/// `staged`; on error nothing is appended for the failed step.
pub fn mount_partition(
    env: &MountEnv<'_>,
    partition: &PartitionDescriptor,
    ledger: &mut ActiveMounts,
    staged: &mut Publication,
) -> Result<()> {
    let action = classify(partition, env.efi_capable)?;
    if action == MountAction::Skip {
        debug!("Skipping {} ({})", partition.device, partition.mount_point);
        return Ok(());
    }

    let device = partition.mount_device();
    let target = prepare_mount_point(env, &partition.mount_point)?;

    match action {
        MountAction::Skip => Ok(()),
        MountAction::Zfs => mount_zfs(env.host, env.root_mount_point, partition, env.zfs),
        MountAction::BtrfsRoot => {
            let options = resolve_mount_options(
                fs_kind::BTRFS,
                env.config.rules(),
                partition,
                env.efi_location,
                env.host,
            );
            mount_btrfs_root(env, partition, &device, &options, ledger, staged)
        }
        MountAction::Direct { fs } => {
            let options = resolve_mount_options(
                &fs,
                env.config.rules(),
                partition,
                env.efi_location,
                env.host,
            );

            info!(
                "Mounting {} on {} ({}, {})",
                device,
                target.display(),
                fs,
                options
            );
            if env.host.mount(&device, &target, &fs, &options) != 0 {
                return Err(MountError::MountFailed {
                    device,
                    target: target.display().to_string(),
                });
            }

            staged.record_options(&partition.mount_point, &options);
            ledger.push(target);
            Ok(())
        }
    }
}

/// Create the mount point and copy the security label of the matching
/// host directory onto it. Labelling is best-effort.
fn prepare_mount_point(env: &MountEnv<'_>, mount_point: &str) -> Result<PathBuf> {
    let target = env.target_path(mount_point);
    fs::create_dir_all(&target)
        .map_err(|e| MountError::io(format!("cannot create {}", target.display()), e))?;

    let reference = format!("--reference={mount_point}");
    let target_arg = target.to_string_lossy().into_owned();
    match env
        .host
        .run("chcon", &[reference.as_str(), target_arg.as_str()], None)
    {
        Ok(_) => {}
        Err(SysError::CommandNotFound(_)) => debug!("chcon not available, not labelling"),
        Err(e) => warn!("Could not label {}: {}", target.display(), e),
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use installer_testing::FakeHost;
    use installer_testing::fixtures::partition;
    use installer_types::MountOptionRule;

    #[test]
    fn skips_unmountable_entries() {
        assert_eq!(
            classify(&partition("/dev/sda3", "ext4", ""), false).unwrap(),
            MountAction::Skip
        );
        assert_eq!(
            classify(&partition("/dev/sda3", "Unformatted", "/data"), false).unwrap(),
            MountAction::Skip
        );
    }

    #[test]
    fn fat_on_boot_is_normalised_to_vfat() {
        for fs in ["fat16", "fat32", "FAT32"] {
            assert_eq!(
                classify(&partition("/dev/sda1", fs, "/boot/efi"), true).unwrap(),
                MountAction::Direct {
                    fs: "vfat".to_string()
                }
            );
        }
        assert_eq!(
            classify(&partition("/dev/sda1", "exfat", "/boot"), false).unwrap(),
            MountAction::Direct {
                fs: "exfat".to_string()
            }
        );
    }

    #[test]
    fn rejects_legacy_filesystems_outside_boot() {
        let error = classify(&partition("/dev/sda1", "fat32", "/data"), false).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnsupportedFilesystem);
        assert_eq!(error.to_string(), "Unsupported partition with fat32 on /data");
    }

    #[test]
    fn ntfs_and_ext2_are_rejected_even_on_boot() {
        for fs in ["ntfs", "ext2"] {
            let error = classify(&partition("/dev/sda1", fs, "/boot"), false).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::UnsupportedFilesystem);
        }
    }

    #[test]
    fn exfat_is_rejected_on_efi_firmware() {
        assert!(classify(&partition("/dev/sda1", "exfat", "/boot/efi"), true).is_err());
    }

    #[test]
    fn btrfs_only_takes_the_two_phase_path_at_root() {
        assert_eq!(
            classify(&partition("/dev/sda2", "btrfs", "/"), false).unwrap(),
            MountAction::BtrfsRoot
        );
        assert_eq!(
            classify(&partition("/dev/sdb1", "btrfs", "/srv"), false).unwrap(),
            MountAction::Direct {
                fs: "btrfs".to_string()
            }
        );
        assert_eq!(
            classify(&partition("/dev/sdb1", "zfs", "/srv"), false).unwrap(),
            MountAction::Zfs
        );
    }

    #[test]
    fn join_under_treats_absolute_paths_as_relative() {
        assert_eq!(join_under(Path::new("/t"), "/"), PathBuf::from("/t"));
        assert_eq!(join_under(Path::new("/t"), "/boot/efi"), PathBuf::from("/t/boot/efi"));
        assert_eq!(join_under(Path::new("/scratch"), "/@home"), PathBuf::from("/scratch/@home"));
    }

    #[test]
    fn direct_mount_uses_mapper_device_and_records_ledgers() {
        let root = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        let config = JobConfig {
            mount_options: Some(vec![MountOptionRule::new("ext4", &["noatime"])]),
            ..Default::default()
        };
        let zfs = ZfsMetadata::default();
        let env = MountEnv {
            host: &host,
            config: &config,
            root_mount_point: root.path(),
            scratch_parent: None,
            efi_location: None,
            efi_capable: false,
            partitions: &[],
            zfs: &zfs,
            swap_is_file: false,
        };

        let mut home = partition("/dev/sda3", "ext4", "/home");
        home.luks_mapper_name = Some("luks-home".to_string());
        let mut ledger = ActiveMounts::new();
        let mut staged = Publication::new(root.path());

        mount_partition(&env, &home, &mut ledger, &mut staged).unwrap();

        let target = root.path().join("home");
        assert!(target.is_dir());
        let mounts = host.mounts();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].device, "/dev/mapper/luks-home");
        assert_eq!(mounts[0].target, target);
        assert_eq!(mounts[0].options, "noatime");
        assert_eq!(ledger.paths(), &[target]);
        assert_eq!(staged.mount_options.len(), 1);
        assert_eq!(staged.mount_options[0].mountpoint, "/home");
    }

    #[test]
    fn failed_direct_mount_records_nothing() {
        let root = tempfile::tempdir().unwrap();
        let host = FakeHost::new();
        host.fail_nth_mount(1);
        host.fail_commands_starting_with("chcon");
        let config = JobConfig::default();
        let zfs = ZfsMetadata::default();
        let env = MountEnv {
            host: &host,
            config: &config,
            root_mount_point: root.path(),
            scratch_parent: None,
            efi_location: None,
            efi_capable: false,
            partitions: &[],
            zfs: &zfs,
            swap_is_file: false,
        };
        let mut ledger = ActiveMounts::new();
        let mut staged = Publication::new(root.path());

        let error = mount_partition(
            &env,
            &partition("/dev/sda1", "ext4", "/var"),
            &mut ledger,
            &mut staged,
        )
        .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::MountExecutorFailure);
        assert!(error.to_string().contains("/dev/sda1"));
        assert!(ledger.is_empty());
        assert!(staged.mount_options.is_empty());
    }
}
