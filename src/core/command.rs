//! Typed builder for remote command lines.
//!
//! Every argument is quoted for the remote shell on its own, so configuration
//! values are never interpolated into a command line unescaped. The rendered
//! command is always a single line.

use std::fmt;

use crate::utils::{shell, template};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<String>,
    sudo: bool,
}

impl RemoteCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            sudo: false,
        }
    }

    /// Invocation of a pre-built helper binary, pinned to `version` when given.
    pub fn helper(program: &str, version: Option<&str>) -> Self {
        let cmd = Self::new(program);
        match version {
            Some(v) if !v.is_empty() => cmd.arg(format!("_{}_", v)),
            _ => cmd,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` as two arguments.
    pub fn flag(self, flag: &str, value: impl ToString) -> Self {
        self.arg(flag).arg(value.to_string())
    }

    /// Run from `dir` (`cd <dir> && ...`).
    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Render to the single line handed to the remote shell.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.args.len() + 5);

        if let Some(dir) = &self.cwd {
            parts.push("cd".to_string());
            parts.push(shell::quote_path(&single_line(dir)));
            parts.push("&&".to_string());
        }

        if self.sudo {
            parts.push("sudo".to_string());
        }

        parts.push(shell::quote_arg(&single_line(&self.program)));
        parts.extend(self.args.iter().map(|a| shell::quote_arg(&single_line(a))));

        parts.join(" ")
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Multi-line values are folded onto one line; the transport runs one line.
fn single_line(value: &str) -> String {
    if value.contains(['\n', '\r']) {
        template::on_one_line(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_program_and_flags() {
        let cmd = RemoteCommand::new("/usr/sbin/monit")
            .flag("-g", "shop")
            .args(["restart", "all"])
            .sudo(true);
        assert_eq!(cmd.render(), "sudo /usr/sbin/monit -g shop restart all");
    }

    #[test]
    fn renders_working_directory() {
        let cmd = RemoteCommand::new("rake")
            .arg("RAILS_ENV=production")
            .arg("db:migrate")
            .in_dir("/home/rails/shop/current");
        assert_eq!(
            cmd.render(),
            "cd '/home/rails/shop/current' && rake RAILS_ENV=production db:migrate"
        );
    }

    #[test]
    fn hostile_values_are_quoted() {
        let cmd = RemoteCommand::new("railsapp-apache").flag("-n", "shop; reboot");
        assert_eq!(cmd.render(), "railsapp-apache -n 'shop; reboot'");
    }

    #[test]
    fn helper_version_is_prepended() {
        let cmd = RemoteCommand::helper("railsapp-monit", Some("2.3.1")).flag("-n", "shop");
        assert_eq!(cmd.render(), "railsapp-monit _2.3.1_ -n shop");

        let bare = RemoteCommand::helper("railsapp-monit", None);
        assert_eq!(bare.render(), "railsapp-monit");
    }

    #[test]
    fn multi_line_values_render_on_one_line() {
        let cmd = RemoteCommand::new("echo").arg("first\n    second");
        let line = cmd.render();
        assert!(!line.contains('\n'));
        assert_eq!(line, "echo 'first second'");
    }
}
