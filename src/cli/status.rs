use super::config::LotusConfig;
use lotus::auth::{CredentialStore, MultiFileCredentialStore};
use std::path::Path;

/// Show the stored pairing state without connecting
pub async fn execute(
    config: &LotusConfig,
    config_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = MultiFileCredentialStore::open(&config.auth.folder).await?;
    let creds = store.load().await;

    println!("📊 Lotus Status");
    println!();
    println!("Config: {}", config_path.display());
    println!("Auth folder: {}", config.auth.folder.display());
    println!("Endpoint: {}", config.connection.url);
    println!();
    println!("{}", describe(&creds));
    Ok(())
}

fn describe(creds: &lotus::Credentials) -> String {
    match &creds.me {
        Some(me) => format!("✅ Paired as {} ({})", me.name, me.id),
        None => "❌ Not paired (run `lotus pair`)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotus::auth::Contact;
    use lotus::Credentials;
    use tempfile::TempDir;

    #[test]
    fn test_describe() {
        assert!(describe(&Credentials::default()).contains("Not paired"));

        let creds = Credentials {
            me: Some(Contact {
                id: "15550100000@s.whatsapp.net".parse().unwrap(),
                name: "Ada".into(),
            }),
            ..Default::default()
        };
        assert!(describe(&creds).contains("15550100000@s.whatsapp.net"));
    }

    #[tokio::test]
    async fn test_status_execute_on_empty_folder() {
        let temp_dir = TempDir::new().unwrap();
        let config = LotusConfig::new(temp_dir.path().join("auth"));

        let result = execute(&config, &temp_dir.path().join("config.toml")).await;
        assert!(result.is_ok());
    }
}
