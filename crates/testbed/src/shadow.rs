//! Empty stand-ins for real files and directories.
//!
//! [`ShadowFile`] copies the original aside and restores it with `mv`, so it
//! survives a reboot. [`ShadowDir`] bind-mounts an empty directory over the
//! original, so a reboot drops it.

use crate::guard::Cleanup;
use crate::host::{HostSession, shell_quote, sudo};
use testbed_core::{Error, Result};

pub struct ShadowFile {
    path: String,
    backup_path: String,
    existed: bool,
    cleanup: Cleanup,
}

impl ShadowFile {
    pub async fn enter(host: &HostSession, path: &str) -> Result<Self> {
        let backup_path = format!("{path}.backup");
        let (quoted_path, quoted_backup) = (shell_quote(path), shell_quote(&backup_path));
        let existed = host.file_exists(path).await?;
        let mut cleanup = Cleanup::new(host.clone());

        if existed {
            if host.file_exists(&backup_path).await? {
                return Err(Error::BackupExists {
                    path: path.to_string(),
                    backup: backup_path,
                });
            }
            host.sudo_check_output(&format!("cp -p {quoted_path} {quoted_backup}"))
                .await?;
            cleanup.push(sudo(&format!(
                "if [ -e {quoted_backup} ]; then mv {quoted_backup} {quoted_path}; fi"
            )));
        } else {
            host.sudo_check_output(&format!("touch {quoted_path}"))
                .await?;
            cleanup.push(sudo(&format!("rm {quoted_path}")));
        }

        let shadow = Self {
            path: path.to_string(),
            backup_path,
            existed,
            cleanup,
        };
        shadow.write("").await?;
        Ok(shadow)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn backup_path(&self) -> &str {
        &self.backup_path
    }

    /// Whether the path existed before it was shadowed.
    pub fn existed(&self) -> bool {
        self.existed
    }

    pub async fn write(&self, content: &str) -> Result<()> {
        self.cleanup.host().write_file(&self.path, content).await
    }

    pub async fn read(&self) -> Result<String> {
        self.cleanup.host().read_file(&self.path).await
    }

    pub async fn exit(mut self) -> Result<()> {
        self.cleanup.run().await
    }
}

pub struct ShadowDir {
    path: String,
    tmpdir: String,
    cleanup: Cleanup,
}

impl ShadowDir {
    pub async fn enter(host: &HostSession, path: &str) -> Result<Self> {
        let tmpdir = host.sudo_check_output("mktemp -d").await?;
        let mut cleanup = Cleanup::new(host.clone());
        let (quoted_path, quoted_tmp) = (shell_quote(path), shell_quote(&tmpdir));
        cleanup.push(sudo(&format!("rm -r {quoted_tmp}")));

        for command in [
            format!("chown --reference={quoted_path} {quoted_tmp}"),
            format!("chmod --reference={quoted_path} {quoted_tmp}"),
            format!("getfacl {quoted_path} | setfacl --set-file=- {quoted_tmp}"),
            format!("mount --bind {quoted_tmp} {quoted_path}"),
        ] {
            host.sudo_check_output(&command).await?;
        }
        cleanup.push_front(sudo(&format!("umount {quoted_path}")));

        Ok(Self {
            path: path.to_string(),
            tmpdir,
            cleanup,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The empty directory mounted over [`ShadowDir::path`].
    pub fn tmpdir(&self) -> &str {
        &self.tmpdir
    }

    /// Path of `name` inside the shadowed directory.
    pub fn file(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.path.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }

    pub async fn exit(mut self) -> Result<()> {
        self.cleanup.run().await
    }
}
