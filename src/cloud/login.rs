use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

use super::callback::{self, CallbackHandle};
use super::spaces::SpacesApi;
use super::store::{TokenStore, exchange_token};
use crate::error::{Error, Result};
use crate::model::LoginPhase;
use crate::terminal::{Log, Prompt, QuestionOptions};

pub const LOGIN_ENDPOINT: &str = "/login?cli=true";
pub const LOGIN_SUCCESS_ENDPOINT: &str = "/login-success";
pub const ACCESS_KEYS_ENDPOINT: &str = "/settings/access-keys";

pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        open::that(url)
    }
}

pub struct LoginOrchestrator {
    browser: Arc<dyn Browser>,
    prompt: Arc<dyn Prompt>,
    log: Arc<dyn Log>,
    spaces: Arc<dyn SpacesApi>,
    callback_port: u16,
    callback_timeout: Option<Duration>,
}

impl LoginOrchestrator {
    pub fn new(
        browser: Arc<dyn Browser>,
        prompt: Arc<dyn Prompt>,
        log: Arc<dyn Log>,
        spaces: Arc<dyn SpacesApi>,
        callback_port: u16,
    ) -> Self {
        Self {
            browser,
            prompt,
            log,
            spaces,
            callback_port,
            callback_timeout: None,
        }
    }

    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Obtains a key through the browser callback or the manual prompt and verifies it.
    pub async fn login(&self, store: &mut TokenStore) -> Result<()> {
        let host = store.provider().host().to_string();
        let mut phase = LoginPhase::Idle;

        let (keys_tx, mut keys_rx) = mpsc::channel::<String>(1);
        let session = callback::start(
            self.callback_port,
            format!("{host}{LOGIN_SUCCESS_ENDPOINT}"),
            keys_tx,
        )
        .await?;

        let obtained = self
            .obtain_key(&host, &session, &mut keys_rx, &mut phase)
            .await;
        keys_rx.close();
        session.shutdown().await;

        let key = match obtained {
            Ok(key) => key,
            Err(err) => {
                advance(&mut phase, LoginPhase::Failed);
                return Err(err);
            }
        };
        advance(&mut phase, LoginPhase::KeyObtained);
        self.verify(store, key, &mut phase).await
    }

    async fn obtain_key(
        &self,
        host: &str,
        session: &CallbackHandle,
        keys: &mut mpsc::Receiver<String>,
        phase: &mut LoginPhase,
    ) -> Result<String> {
        let login_url = login_url(host, &session.redirect_url())?;
        debug!(callback = %session.local_addr(), "login callback ready");
        advance(phase, LoginPhase::BrowserAttempted);

        if let Err(err) = self.browser.open(&login_url) {
            debug!(error = %err, "browser launch failed");
            advance(phase, LoginPhase::ManualPending);
            return self.manual_key(host, keys).await;
        }

        advance(phase, LoginPhase::CallbackPending);
        self.log.info(&format!(
            "If the browser does not open automatically, please navigate to {login_url}"
        ));
        self.log.start_wait("Logging into cloud provider...");
        let received = self.wait_for_callback(keys).await;
        self.log.stop_wait();
        received
    }

    async fn manual_key(&self, host: &str, keys: &mut mpsc::Receiver<String>) -> Result<String> {
        self.log.info(&format!(
            "Unable to open web browser for login page.\n\n Please follow these instructions for manually logging in:\n\n  1. Open this URL in a browser: {host}{ACCESS_KEYS_ENDPOINT}\n  2. After logging in, click the 'Create Key' button\n  3. Enter a key name (e.g. my-key) and click 'Create Access Key'\n  4. Copy the generated key from the input field"
        ));
        let question = QuestionOptions::password("5. Enter the access key here:");

        let key = tokio::select! {
            answer = self.prompt.question(&question) => {
                let answer = answer.map_err(|err| Error::auth_with("failed to read access key", err))?;
                self.log.write_line();
                answer
            }
            Some(key) = keys.recv() => {
                self.log.write_line();
                self.log.info("Received access key from browser");
                key
            }
        };

        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(Error::auth("no access key provided"));
        }
        Ok(key)
    }

    async fn wait_for_callback(&self, keys: &mut mpsc::Receiver<String>) -> Result<String> {
        let received = match self.callback_timeout {
            Some(limit) => tokio::time::timeout(limit, keys.recv()).await.map_err(|_| {
                Error::auth(format!(
                    "timed out after {}s waiting for the login callback",
                    limit.as_secs()
                ))
            })?,
            None => keys.recv().await,
        };
        received.ok_or_else(|| Error::auth("login callback closed before a key was received"))
    }

    async fn verify(&self, store: &mut TokenStore, key: String, phase: &mut LoginPhase) -> Result<()> {
        advance(phase, LoginPhase::Verifying);
        let host = store.provider().host().to_string();
        let previous_key = store.provider_mut().key.replace(key.clone());

        let verified = async {
            let token = exchange_token(store.exchanger(), &host, &key).await?;
            let spaces = self.spaces.list_spaces(&host, &token).await?;
            debug!(
                spaces = ?spaces.iter().map(|space| (space.id, space.name.as_str())).collect::<Vec<_>>(),
                "provider accepted token"
            );
            Ok::<_, Error>(token)
        }
        .await;

        match verified {
            Ok(token) => {
                store.provider_mut().token = Some(token);
                advance(phase, LoginPhase::Authenticated);
                info!(provider = %store.provider().name, "login verified");
                Ok(())
            }
            Err(err) => {
                store.provider_mut().key = previous_key;
                advance(phase, LoginPhase::Failed);
                Err(Error::auth_with(format!("login to {host} failed"), err))
            }
        }
    }
}

fn login_url(host: &str, redirect: &str) -> Result<String> {
    let mut url = Url::parse(&format!("{host}{LOGIN_ENDPOINT}")).map_err(|err| {
        Error::configuration_with(format!("invalid provider host '{host}'"), err)
    })?;
    url.query_pairs_mut().append_pair("redirect", redirect);
    Ok(url.to_string())
}

fn advance(phase: &mut LoginPhase, next: LoginPhase) {
    debug!(from = %phase, to = %next, "login phase");
    *phase = next;
}
