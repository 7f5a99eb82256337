mod common;

use common::{Sandbox, published_options, storage};
use installer_mount::{ErrorKind, JobConfig, RunOptions};
use installer_testing::fixtures::extra_mount;
use serde_json::json;

fn five_ext4_partitions() -> serde_json::Value {
    json!({
        "partitions": [
            {"device": "/dev/sda5", "fs": "ext4", "mountPoint": "/var"},
            {"device": "/dev/sda1", "fs": "ext4", "mountPoint": "/"},
            {"device": "/dev/sda3", "fs": "ext4", "mountPoint": "/home"},
            {"device": "/dev/sda2", "fs": "ext4", "mountPoint": "/boot"},
            {"device": "/dev/sda4", "fs": "ext4", "mountPoint": "/srv"}
        ]
    })
}

#[test]
fn third_mount_failure_unwinds_first_two_in_reverse() {
    let sandbox = Sandbox::new();
    sandbox.host.fail_nth_mount(3);
    let mut state = storage(five_ext4_partitions());

    let error = sandbox.run(&mut state, &JobConfig::default()).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MountExecutorFailure);
    assert_eq!(error.title(), "Mount Failure");
    assert_eq!(
        error.to_string(),
        format!("Cannot mount /dev/sda3 on {}", sandbox.target("/home").display())
    );

    assert_eq!(sandbox.host.mounts().len(), 3);
    assert_eq!(
        sandbox.host.unmount_targets(),
        vec![sandbox.target("/boot"), sandbox.target("/")]
    );
    assert!(sandbox.host.mounted().is_empty());

    assert!(published_options(&state).is_empty());
    assert!(!state.contains("rootMountPoint"));
    assert!(!state.contains("extraMounts"));
}

#[test]
fn every_target_is_mounted_once_on_success() {
    let sandbox = Sandbox::new();
    let mut state = storage(five_ext4_partitions());

    let report = sandbox.run(&mut state, &JobConfig::default()).unwrap();

    let expected: Vec<_> = ["/", "/boot", "/home", "/srv", "/var"]
        .into_iter()
        .map(|mount_point| sandbox.target(mount_point))
        .collect();
    assert_eq!(sandbox.mounted_targets(), expected);
    assert_eq!(report.active_mounts.paths(), expected.as_slice());
    assert!(sandbox.host.unmount_targets().is_empty());
    assert_eq!(published_options(&state).len(), 5);
    let root = sandbox.root().to_string_lossy().into_owned();
    assert_eq!(
        state.raw("rootMountPoint").and_then(|value| value.as_str()),
        Some(root.as_str())
    );
}

#[test]
fn failing_extra_mount_unwinds_btrfs_subvolumes_and_root() {
    let sandbox = Sandbox::new();
    sandbox.host.fail_mount_on(sandbox.target("/proc"));
    let mut state = storage(json!({
        "partitions": [{"device": "/dev/sda2", "fs": "btrfs", "mountPoint": "/"}]
    }));
    let config = JobConfig {
        extra_mounts: vec![extra_mount("proc", "proc", "/proc")],
        ..Default::default()
    };

    let error = sandbox.run(&mut state, &config).unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MountExecutorFailure);
    let unmounted = sandbox.host.unmount_targets();
    assert_eq!(unmounted.len(), 3);
    assert!(unmounted[0].starts_with(sandbox.scratch.path()));
    assert_eq!(&unmounted[1..], &[sandbox.target("/home"), sandbox.target("/")]);
    assert!(sandbox.host.mounted().is_empty());
    assert!(!state.contains("btrfsSubvolumes"));
    assert!(!state.contains("btrfsRootSubvolume"));
}

#[test]
fn labelling_failure_does_not_abort_the_run() {
    let sandbox = Sandbox::new();
    sandbox
        .host
        .fail_command(&format!("chcon --reference=/home {}", sandbox.target("/home").display()));
    let mut state = storage(five_ext4_partitions());

    sandbox.run(&mut state, &JobConfig::default()).unwrap();

    assert_eq!(sandbox.mounted_targets().len(), 5);
    assert!(sandbox.host.unmount_targets().is_empty());
}

#[test]
fn unmount_failure_falls_back_to_lazy_detach() {
    let sandbox = Sandbox::new();
    sandbox.host.fail_nth_mount(2);
    sandbox
        .host
        .fail_command(&format!("umount -v {}", sandbox.root().display()));
    let mut state = storage(five_ext4_partitions());

    sandbox.run(&mut state, &JobConfig::default()).unwrap_err();

    assert_eq!(
        sandbox
            .host
            .commands()
            .into_iter()
            .filter(|command| command.starts_with("umount"))
            .collect::<Vec<_>>(),
        vec![
            format!("umount -v {}", sandbox.root().display()),
            format!("umount -v -l {}", sandbox.root().display()),
        ]
    );
}

#[test]
fn symlinked_root_is_unwound_through_its_target() {
    let sandbox = Sandbox::new();
    let links = tempfile::tempdir().unwrap();
    let link = links.path().join("root");
    std::os::unix::fs::symlink(sandbox.root(), &link).unwrap();
    sandbox.host.fail_nth_mount(3);
    let mut state = storage(five_ext4_partitions());
    let options = RunOptions {
        root_mount_point: Some(link),
        scratch_parent: Some(sandbox.scratch.path().to_path_buf()),
    };

    installer_mount::run(&mut state, &JobConfig::default(), &sandbox.host, &options).unwrap_err();

    assert_eq!(
        sandbox.host.unmount_targets(),
        vec![sandbox.target("/boot"), sandbox.target("/")]
    );
    assert!(sandbox.host.mounted().is_empty());
    assert!(!state.contains("rootMountPoint"));
}
