use anyhow::Result;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const ENV_PASSWORD: &str = "PRISMSYNC_PASSWORD";
const KEYRING_SERVICE: &str = "prismsync";

/// Mailbox password lookup: environment variable, then OS keyring, then a
/// permission-restricted file under the config directory.
pub struct CredentialStore {
    username: String,
    password_file: PathBuf,
}

impl CredentialStore {
    pub fn new(username: &str) -> Self {
        let safe_name = username.replace(['@', '.', '/', '\\', ':'], "_");
        let password_file = crate::config::Config::config_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(format!(".password_{}", safe_name));

        Self {
            username: username.to_string(),
            password_file,
        }
    }

    /// Check for password in environment variable first
    fn env_password() -> Option<String> {
        env::var(ENV_PASSWORD).ok()
    }

    fn keyring_key(&self) -> String {
        format!("imap:{}", self.username)
    }

    fn keyring_get(&self) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.keyring_key()).ok()?;
        entry.get_password().ok()
    }

    fn keyring_set(&self, password: &str) -> bool {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &self.keyring_key()) {
            entry.set_password(password).is_ok()
        } else {
            false
        }
    }

    /// Read password from file fallback
    fn file_get(&self) -> Option<String> {
        fs::read_to_string(&self.password_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Write password to file fallback (with restricted permissions)
    fn file_set(&self, password: &str) -> Result<()> {
        if let Some(parent) = self.password_file.parent() {
            fs::create_dir_all(parent)?;
        }

        // Create file with restricted permissions atomically to avoid TOCTOU
        #[cfg(unix)]
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.password_file)?;
            file.write_all(password.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.password_file, password)?;
        }

        Ok(())
    }

    pub fn get_password(&self) -> Result<String> {
        if let Some(pwd) = Self::env_password() {
            return Ok(pwd);
        }

        if let Some(pwd) = self.keyring_get() {
            return Ok(pwd);
        }

        if let Some(pwd) = self.file_get() {
            return Ok(pwd);
        }

        anyhow::bail!(
            "Password not found. Set {} env var or run 'prismsync setup'.",
            ENV_PASSWORD
        )
    }

    pub fn set_password(&self, password: &str) -> Result<()> {
        // Keyring first; verify the round-trip actually worked
        if self.keyring_set(password) && self.keyring_get().is_some() {
            return Ok(());
        }

        eprintln!("Note: Keyring unavailable, using file-based storage.");
        self.file_set(password)?;

        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        Self::env_password().is_some() || self.keyring_get().is_some() || self.file_get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent parallel test interference with env vars
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_env_password_takes_priority() {
        let _guard = ENV_MUTEX.lock().unwrap();

        let username = format!("priority_test_{}@example.com", std::process::id());
        let store = CredentialStore::new(&username);
        let _ = fs::remove_file(&store.password_file);

        store.file_set("file_password").unwrap();
        unsafe { env::set_var(ENV_PASSWORD, "env_password") };

        assert!(store.has_credentials());
        assert_eq!(store.get_password().unwrap(), "env_password");

        unsafe { env::remove_var(ENV_PASSWORD) };
        assert_eq!(store.file_get(), Some("file_password".to_string()));

        let _ = fs::remove_file(&store.password_file);
    }

    #[test]
    fn test_username_specific_password_files() {
        let store1 = CredentialStore::new("user1@example.com");
        let store2 = CredentialStore::new("user2@example.com");

        assert_ne!(store1.password_file, store2.password_file);
        assert!(
            store1
                .password_file
                .to_string_lossy()
                .contains("user1_example_com")
        );
    }

    #[test]
    fn test_special_chars_sanitized() {
        let store = CredentialStore::new("user.name+tag@sub.domain.com");
        let filename = store.password_file.file_name().unwrap().to_string_lossy();

        assert!(!filename.contains('@'), "filename contains @: {}", filename);
        assert!(!filename.contains('/'), "filename contains /: {}", filename);
        assert!(filename.starts_with(".password_"));
    }

    #[test]
    fn test_file_fallback_roundtrip() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { env::remove_var(ENV_PASSWORD) };

        let username = format!("file_test_{}@example.com", std::process::id());
        let store = CredentialStore::new(&username);
        let _ = fs::remove_file(&store.password_file);

        store.file_set("test_password").unwrap();
        assert!(store.has_credentials());
        assert_eq!(store.file_get(), Some("test_password".to_string()));

        let _ = fs::remove_file(&store.password_file);
    }
}
