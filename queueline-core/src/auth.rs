//! Login and re-authentication handshake.
//!
//! Two entry paths: an interactive login (queue name + password) and a
//! deep-link re-authentication used when the distributor page reloads
//! with a hand-off token instead of a form submission. A rejected
//! attempt never leaves partial state behind.

use crate::credential::{
    validate_password, validate_queue_name, verification_code, CredentialRecord, CredentialStore,
};
use crate::password::{classify, hash_password, verify_password, SecretFormat};
use crate::queue::{QueueState, QueueStore};
use crate::session::Session;
use crate::Result;
use chrono::Utc;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Queue name or password rejected")]
    BadCredentials,
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),
    #[error("Tampered or stale link: {0}")]
    TamperedLink(String),
}

/// Credential material handed to the distributor page after a
/// successful login. Travels as URL parameters, so everything is a
/// string and the composite form is underscore-separated (safe: the
/// password class is alphanumeric and the hash format carries no
/// underscore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffToken {
    pub verification_code: String,
    pub plaintext: String,
    pub secret: String,
}

impl HandoffToken {
    pub fn encode(&self) -> String {
        format!(
            "{}_{}_{}",
            self.verification_code, self.plaintext, self.secret
        )
    }

    pub fn parse(token: &str) -> std::result::Result<Self, AuthError> {
        let mut parts = token.splitn(3, '_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(code), Some(plain), Some(secret))
                if !code.is_empty() && !plain.is_empty() && !secret.is_empty() =>
            {
                Ok(Self {
                    verification_code: code.to_string(),
                    plaintext: plain.to_string(),
                    secret: secret.to_string(),
                })
            }
            _ => Err(AuthError::TamperedLink("Malformed token".to_string())),
        }
    }
}

/// Result of an interactive login.
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub session: Session,
    pub token: HandoffToken,
    /// True when this login claimed an unseen queue name.
    pub created: bool,
}

/// The session/auth handshake over the credential and queue stores.
#[derive(Clone)]
pub struct Authenticator {
    credentials: CredentialStore,
    queues: QueueStore,
}

impl Authenticator {
    pub fn new(credentials: CredentialStore, queues: QueueStore) -> Self {
        Self {
            credentials,
            queues,
        }
    }

    /// Interactive login. An unseen queue name is claimed on the spot:
    /// a credential record and a zeroed queue document are created and
    /// the attempt succeeds. A known name must pass the verification
    /// chain; a failure has no side effect on either store.
    pub async fn login(&self, queue_name: &str, password: &str) -> Result<LoginSuccess> {
        validate_queue_name(queue_name)?;
        validate_password(password)?;

        match self.credentials.lookup(queue_name)? {
            None => {
                let now = Utc::now();
                let record = CredentialRecord {
                    secret: hash_password(password)?,
                    verification_code: verification_code(password),
                    created_at: now,
                    last_accessed_at: now,
                };
                let token = Self::token_for(&record, password);
                self.credentials.upsert(queue_name, record).await?;

                let mut doc = QueueState::new(queue_name);
                self.queues.persist(&mut doc).await?;

                Ok(LoginSuccess {
                    session: Session::start(queue_name),
                    token,
                    created: true,
                })
            }
            Some(mut record) => {
                if !Self::secret_matches(&record, password) {
                    return Err(AuthError::BadCredentials.into());
                }
                // Opportunistic upgrade: any legacy record that just
                // authenticated gets rewritten in the hashed format.
                if classify(&record.secret) != SecretFormat::Hashed {
                    record.secret = hash_password(password)?;
                }
                record.last_accessed_at = Utc::now();
                let token = Self::token_for(&record, password);
                self.credentials.upsert(queue_name, record).await?;

                Ok(LoginSuccess {
                    session: Session::start(queue_name),
                    token,
                    created: false,
                })
            }
        }
    }

    /// Deep-link re-authentication for a reloaded distributor page.
    /// All three checks must pass: verification code, stored secret,
    /// and the plaintext itself (by hash or, for legacy records, by
    /// digest). No partial access on any failure.
    pub async fn reauthenticate(&self, queue_name: &str, token: &str) -> Result<Session> {
        validate_queue_name(queue_name)?;
        let mut parsed = HandoffToken::parse(token)?;

        let record = self
            .credentials
            .lookup(queue_name)?
            .ok_or_else(|| AuthError::UnknownQueue(queue_name.to_string()))?;

        let verdict = if record.verification_code != parsed.verification_code {
            Err(AuthError::TamperedLink("Verification code mismatch".to_string()))
        } else if record.secret != parsed.secret {
            Err(AuthError::TamperedLink("Credential mismatch".to_string()))
        } else if !verify_password(&parsed.plaintext, &record.secret)
            && verification_code(&parsed.plaintext) != record.verification_code
        {
            Err(AuthError::TamperedLink("Password check failed".to_string()))
        } else {
            Ok(())
        };
        parsed.plaintext.zeroize();
        verdict?;

        self.credentials.touch(queue_name).await?;
        Ok(Session::start(queue_name))
    }

    /// Display-page access: the link itself is the capability, so the
    /// only check is that the queue exists.
    pub fn display_access(&self, queue_name: &str) -> Result<()> {
        if self.credentials.lookup(queue_name)?.is_none() {
            return Err(AuthError::UnknownQueue(queue_name.to_string()).into());
        }
        Ok(())
    }

    fn token_for(record: &CredentialRecord, password: &str) -> HandoffToken {
        HandoffToken {
            verification_code: record.verification_code.clone(),
            plaintext: password.to_string(),
            secret: record.secret.clone(),
        }
    }

    fn secret_matches(record: &CredentialRecord, password: &str) -> bool {
        match classify(&record.secret) {
            SecretFormat::Hashed => verify_password(password, &record.secret),
            // The reversible transform is gone; legacy obfuscated
            // records match through the fast digest.
            SecretFormat::LegacyObfuscated => {
                verification_code(password) == record.verification_code
            }
            SecretFormat::LegacyPlaintext => record.secret == password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::AUTH_KEY;
    use crate::queue::state_key;
    use crate::store::{KvStore, MemoryStore};
    use std::sync::Arc;

    fn authenticator() -> (Authenticator, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        let auth = Authenticator::new(
            CredentialStore::new(kv.clone()),
            QueueStore::new(kv.clone()),
        );
        (auth, kv)
    }

    #[tokio::test]
    async fn first_login_claims_the_name() {
        let (auth, kv) = authenticator();
        let login = auth.login("Clinic-A", "abcd1234").await.unwrap();
        assert!(login.created);
        assert_eq!(login.session.queue_name, "Clinic-A");

        // Both the credential record and a zeroed queue document exist
        assert!(kv.get(AUTH_KEY).unwrap().is_some());
        assert!(kv.get(&state_key("Clinic-A")).unwrap().is_some());
    }

    #[tokio::test]
    async fn second_login_verifies_the_password() {
        let (auth, _) = authenticator();
        auth.login("Clinic-A", "abcd1234").await.unwrap();

        let again = auth.login("Clinic-A", "abcd1234").await.unwrap();
        assert!(!again.created);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_without_side_effects() {
        let (auth, kv) = authenticator();
        auth.login("Clinic-A", "abcd1234").await.unwrap();
        let auth_before = kv.get(AUTH_KEY).unwrap();
        let state_before = kv.get(&state_key("Clinic-A")).unwrap();

        let err = auth.login("Clinic-A", "wrong999").await.unwrap_err();
        assert!(matches!(
            err,
            crate::TicketingError::Auth(AuthError::BadCredentials)
        ));
        assert_eq!(kv.get(AUTH_KEY).unwrap(), auth_before);
        assert_eq!(kv.get(&state_key("Clinic-A")).unwrap(), state_before);
    }

    #[tokio::test]
    async fn malformed_inputs_fail_before_any_storage() {
        let (auth, kv) = authenticator();
        assert!(auth.login("bad name", "abcd1234").await.is_err());
        assert!(auth.login("Clinic-A", "ab").await.is_err());
        assert!(kv.get(AUTH_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn handoff_token_reauthenticates() {
        let (auth, _) = authenticator();
        let login = auth.login("Clinic-A", "abcd1234").await.unwrap();

        let session = auth
            .reauthenticate("Clinic-A", &login.token.encode())
            .await
            .unwrap();
        assert_eq!(session.queue_name, "Clinic-A");
    }

    #[tokio::test]
    async fn tampered_token_is_rejected() {
        let (auth, _) = authenticator();
        let login = auth.login("Clinic-A", "abcd1234").await.unwrap();

        let mut token = login.token.clone();
        token.plaintext = "abcd1235".to_string();
        let err = auth
            .reauthenticate("Clinic-A", &token.encode())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::TicketingError::Auth(AuthError::TamperedLink(_))
        ));

        assert!(auth.reauthenticate("Clinic-A", "garbage").await.is_err());
        assert!(auth
            .reauthenticate("Clinic-B", &login.token.encode())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn legacy_plaintext_record_upgrades_on_login() {
        let (auth, _) = authenticator();
        let now = Utc::now();
        auth.credentials
            .upsert(
                "Clinic-A",
                CredentialRecord {
                    secret: "abcd1234".to_string(),
                    verification_code: verification_code("abcd1234"),
                    created_at: now,
                    last_accessed_at: now,
                },
            )
            .await
            .unwrap();

        let login = auth.login("Clinic-A", "abcd1234").await.unwrap();
        assert!(!login.created);

        let upgraded = auth.credentials.lookup("Clinic-A").unwrap().unwrap();
        assert_eq!(classify(&upgraded.secret), SecretFormat::Hashed);
        assert!(verify_password("abcd1234", &upgraded.secret));
    }

    #[tokio::test]
    async fn legacy_obfuscated_record_matches_by_digest() {
        let (auth, _) = authenticator();
        let now = Utc::now();
        auth.credentials
            .upsert(
                "Clinic-A",
                CredentialRecord {
                    secret: "obf1:bm90LXJldmVyc2Vk".to_string(),
                    verification_code: verification_code("abcd1234"),
                    created_at: now,
                    last_accessed_at: now,
                },
            )
            .await
            .unwrap();

        assert!(auth.login("Clinic-A", "wrong999").await.is_err());
        let login = auth.login("Clinic-A", "abcd1234").await.unwrap();
        assert!(!login.created);

        let upgraded = auth.credentials.lookup("Clinic-A").unwrap().unwrap();
        assert_eq!(classify(&upgraded.secret), SecretFormat::Hashed);
    }

    #[tokio::test]
    async fn display_access_requires_an_existing_queue() {
        let (auth, _) = authenticator();
        assert!(auth.display_access("Clinic-A").is_err());
        auth.login("Clinic-A", "abcd1234").await.unwrap();
        assert!(auth.display_access("Clinic-A").is_ok());
    }
}
