use std::collections::BTreeMap;
use std::env;
use std::path::Path;

/// Optional hints about the target machine, e.g. `os = ubuntu`, `version = 22.04`.
///
/// Keys are kept sorted so the prompt built from a context is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemContext {
    entries: BTreeMap<String, String>,
}

impl SystemContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Empty keys or values are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();
        if !key.is_empty() && !value.is_empty() {
            self.entries.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Detects the current host: OS family, version, architecture and login shell.
    pub fn detect() -> Self {
        let info = os_info::get();
        let mut context = SystemContext::new()
            .with("os", os_family(&info))
            .with("architecture", info.architecture().unwrap_or_default());

        let version = info.version();
        if *version != os_info::Version::Unknown {
            context.insert("version", version.to_string());
        }
        if let Some(codename) = info.codename() {
            context.insert("codename", codename);
        }
        context.insert("shell", detect_shell());
        context
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SystemContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = SystemContext::new();
        for (key, value) in iter {
            context.insert(key, value);
        }
        context
    }
}

/// Whether an NVIDIA GPU with a loaded driver is present.
pub fn has_nvidia_gpu() -> bool {
    ["/proc/driver/nvidia/version", "/dev/nvidia0"]
        .iter()
        .any(|path| Path::new(path).exists())
}

fn os_family(info: &os_info::Info) -> String {
    info.os_type().to_string().to_lowercase()
}

/// Name of the user's POSIX shell, from `$SHELL`.
fn detect_shell() -> String {
    let shell_path = env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
    shell_name(&shell_path)
}

fn shell_name(shell_path: &str) -> String {
    Path::new(shell_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sh")
        .to_lowercase()
}
