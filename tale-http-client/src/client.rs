//! Tale HTTP client implementation

use crate::error::TaleError;
use crate::parser::Decoded;
use crate::poller::{PendingTask, PollPolicy, Sleeper, TaskState, ThreadSleeper, wait_for_task};
use crate::registry::{ApiMethod, HttpVerb};
use crate::session::Session;
use crate::transport::{FormParams, RawResponse, Transport};
use crate::types::{
    AuthorisationRequestData, AuthorisationState, AuthorisationStateData, AuthorisationStatus, LoginData,
    ThirdPartyApp,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://the-tale.org";

/// Value sent as `api_client` when none is configured
pub const DEFAULT_API_CLIENT: &str = concat!("tale-http-client-", env!("CARGO_PKG_VERSION"));

const ENV_BASE_URL: &str = "TALE_BASE_URL";
const ENV_API_CLIENT: &str = "TALE_API_CLIENT";
const ENV_POLL_INTERVAL: &str = "TALE_POLL_INTERVAL";
const ENV_POLL_MAX_ATTEMPTS: &str = "TALE_POLL_MAX_ATTEMPTS";

/// Configuration and transport shared by every client state
#[derive(Clone, Debug)]
struct ClientCore {
    transport: Transport,
    api_client: String,
    poll_policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ClientCore {
    fn send(
        &self,
        method: ApiMethod,
        path_params: &[(&str, &str)],
        form: &FormParams,
        session: Option<&Session>,
    ) -> Result<RawResponse, TaleError> {
        let descriptor = method.descriptor();
        let url = descriptor.build_url(path_params, &self.api_client)?;
        debug!(method = method.name(), "calling Tale API");
        self.transport.request(&url, descriptor.verb, form, session)
    }

    fn call(
        &self,
        method: ApiMethod,
        path_params: &[(&str, &str)],
        form: &FormParams,
        session: Option<&Session>,
    ) -> Result<Decoded, TaleError> {
        let raw = self.send(method, path_params, form, session)?;
        self.transport.decode(&raw)
    }
}

/// Deserialize the `data` field of a payload
fn response_data<T: serde::de::DeserializeOwned>(decoded: &Decoded, what: &str) -> Result<T, TaleError> {
    let data = decoded
        .data()
        .ok_or_else(|| TaleError::UnexpectedResponse(format!("{what}: response has no `data`")))?;
    serde_json::from_value(data.clone()).map_err(|e| TaleError::UnexpectedResponse(format!("{what}: {e}")))
}

/// Entry point: a client without a session
///
/// Only calls that need no session are available here. Logging in or
/// completing a third-party authorisation yields an [`AuthenticatedClient`].
///
/// # Example
///
/// ```no_run
/// use tale_http_client::TaleClient;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TaleClient::new()?;
/// let account = client.login("hero@example.com", "secret")?;
///
/// let shop = account.shop_info()?;
/// println!("Shop: {:?}", shop);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TaleClient {
    core: ClientCore,
}

impl TaleClient {
    /// Create a client for the default host with rustls-tls and no redirect policy
    ///
    /// # Errors
    ///
    /// Returns `TaleError::ClientInit` if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, TaleError> {
        Self::builder().build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> TaleClientBuilder {
        TaleClientBuilder::new()
    }

    /// Base URL every request is sent to
    pub fn base_url(&self) -> &reqwest::Url {
        self.core.transport.base_url()
    }

    /// Basic information about the game
    pub fn game_info(&self) -> Result<Decoded, TaleError> {
        self.core.call(ApiMethod::GameInfo, &[], &FormParams::new(), None)
    }

    /// Log in with email and password
    ///
    /// The session cookies returned by the server, plus the account id and
    /// name when the response carries them, make up the new session.
    ///
    /// # Errors
    ///
    /// * `TaleError::Api` - The server rejected the credentials
    /// * `TaleError::NotAuthenticated` - The response set no session cookies
    /// * `TaleError::Request` - Network error
    pub fn login(&self, email: &str, password: &str) -> Result<AuthenticatedClient, TaleError> {
        let mut form = FormParams::new();
        form.push("email", email).push("password", password);

        let raw = self.core.send(ApiMethod::Login, &[], &form, None)?;
        drop(form);
        let decoded = self.core.transport.decode(&raw)?;

        let session = Session::from_set_cookie(raw.set_cookies()).ok_or(TaleError::NotAuthenticated)?;
        let login: LoginData = match decoded.data() {
            None => LoginData::default(),
            Some(data) => serde_json::from_value(data.clone()).unwrap_or_else(|err| {
                warn!(%err, "login data not understood, account details unknown");
                LoginData::default()
            }),
        };
        let session = session.with_account(login.account_id, login.account_name);

        info!(account_id = ?session.account_id(), "logged in");
        Ok(self.with_session(session))
    }

    /// Ask the server to authorise this application
    ///
    /// The user has to open [`PendingAuthorisation::authorisation_page`] and
    /// confirm; progress is checked with [`PendingAuthorisation::check_state`].
    ///
    /// # Errors
    ///
    /// * `TaleError::Api` - The server refused the request
    /// * `TaleError::UnexpectedResponse` - No `authorisation_page` in the reply
    pub fn request_authorisation(&self, app: &ThirdPartyApp) -> Result<PendingAuthorisation, TaleError> {
        let mut form = FormParams::new();
        form.push("application_name", app.name.as_str())
            .push("application_info", app.info.as_str())
            .push("application_description", app.description.as_str());

        let raw = self.core.send(ApiMethod::AuthRequest, &[], &form, None)?;
        let decoded = self.core.transport.decode(&raw)?;
        let data: AuthorisationRequestData = response_data(&decoded, "request-authorisation")?;

        let session = Session::from_set_cookie(raw.set_cookies());
        debug!(has_session = session.is_some(), "authorisation requested");

        Ok(PendingAuthorisation {
            core: self.core.clone(),
            session,
            authorisation_page: data.authorisation_page,
            state: AuthorisationState::NotRequested,
        })
    }

    /// Resume an existing session
    pub fn with_session(&self, session: Session) -> AuthenticatedClient {
        AuthenticatedClient {
            core: self.core.clone(),
            session,
        }
    }
}

/// A third-party authorisation waiting for the user's decision
#[derive(Debug)]
pub struct PendingAuthorisation {
    core: ClientCore,
    session: Option<Session>,
    authorisation_page: String,
    state: AuthorisationState,
}

impl PendingAuthorisation {
    /// Page the user must open to grant access
    pub fn authorisation_page(&self) -> &str {
        &self.authorisation_page
    }

    /// State seen by the last [`check_state`](Self::check_state) call
    pub fn state(&self) -> AuthorisationState {
        self.state
    }

    /// Ask the server how the authorisation is going
    ///
    /// On success the session cookies and account details returned by the
    /// server are captured.
    ///
    /// # Errors
    ///
    /// Returns `TaleError::NotAuthenticated` if the authorisation request set
    /// no session cookies, since the state is tracked per session.
    pub fn check_state(&mut self) -> Result<AuthorisationStatus, TaleError> {
        let session = self.session.as_ref().ok_or(TaleError::NotAuthenticated)?;
        let raw = self
            .core
            .send(ApiMethod::AuthState, &[], &FormParams::new(), Some(session))?;
        let decoded = self.core.transport.decode(&raw)?;
        let data: AuthorisationStateData = response_data(&decoded, "authorisation-state")?;
        let state = AuthorisationState::try_from(data.state)?;

        if state == AuthorisationState::Success
            && let Some(session) = self.session.as_mut()
        {
            session.capture(raw.set_cookies());
            session.set_account(data.account_id, data.account_name.clone());
            info!(account_id = ?data.account_id, "third-party authorisation granted");
        }
        self.state = state;

        Ok(AuthorisationStatus {
            state,
            account_id: data.account_id,
            account_name: data.account_name,
        })
    }

    /// Turn a granted authorisation into an authenticated client
    ///
    /// # Errors
    ///
    /// Returns `TaleError::NotAuthenticated` unless the last state check
    /// reported success.
    pub fn into_authenticated(self) -> Result<AuthenticatedClient, TaleError> {
        if self.state != AuthorisationState::Success {
            return Err(TaleError::NotAuthenticated);
        }
        let session = self.session.ok_or(TaleError::NotAuthenticated)?;
        Ok(AuthenticatedClient {
            core: self.core,
            session,
        })
    }
}

/// A client holding an established session
///
/// Every request carries the session's `Cookie` header; POSTs also carry
/// `x-csrftoken`.
#[derive(Clone, Debug)]
pub struct AuthenticatedClient {
    core: ClientCore,
    session: Session,
}

impl AuthenticatedClient {
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn call(&self, method: ApiMethod, form: &FormParams) -> Result<Decoded, TaleError> {
        self.core.call(method, &[], form, Some(&self.session))
    }

    /// End the session on the server
    pub fn logout(self) -> Result<TaleClient, TaleError> {
        self.call(ApiMethod::AuthLogout, &FormParams::new())?;
        info!(account_id = ?self.session.account_id(), "logged out");
        Ok(TaleClient { core: self.core })
    }

    /// Basic information about the game, as seen by this session
    pub fn game_info(&self) -> Result<Decoded, TaleError> {
        self.call(ApiMethod::GameInfo, &FormParams::new())
    }

    /// Information about the session's own account
    ///
    /// When the account id is unknown (e.g. the login response did not
    /// report it) an empty JSON object is returned without a request.
    pub fn account_info(&self) -> Result<Decoded, TaleError> {
        match self.session.account_id() {
            Some(account_id) => self.account_info_for(account_id),
            None => Ok(Decoded::Json(serde_json::json!({}))),
        }
    }

    /// Information about any account
    pub fn account_info_for(&self, account_id: u64) -> Result<Decoded, TaleError> {
        let id = account_id.to_string();
        self.core.call(
            ApiMethod::AccountInfo,
            &[("accountId", id.as_str())],
            &FormParams::new(),
            Some(&self.session),
        )
    }

    pub fn new_messages_number(&self) -> Result<Decoded, TaleError> {
        self.call(ApiMethod::NewMessagesNumber, &FormParams::new())
    }

    pub fn shop_info(&self) -> Result<Decoded, TaleError> {
        self.call(ApiMethod::ShopInfo, &FormParams::new())
    }

    /// Market prices for one card type
    pub fn shop_item_prices(&self, item_type: &str) -> Result<Decoded, TaleError> {
        let mut form = FormParams::new();
        form.push("item_type", item_type);
        self.call(ApiMethod::ShopItemPrices, &form)
    }

    /// Put cards up for sale at `price`
    pub fn shop_create_sell_lot(&self, cards: &[&str], price: u64) -> Result<Decoded, TaleError> {
        let mut form = FormParams::new();
        form.push_all("card", cards.iter().copied())
            .push("price", price.to_string());
        self.call(ApiMethod::ShopCreateSellLot, &form)
    }

    /// Withdraw a lot of the given card type and price
    pub fn shop_cancel_sell_lot(&self, item_type: &str, price: u64) -> Result<Decoded, TaleError> {
        let mut form = FormParams::new();
        form.push("item_type", item_type).push("price", price.to_string());
        self.call(ApiMethod::ShopCancelSellLot, &form)
    }

    /// Buy a card of the given type at `price`
    ///
    /// The purchase runs as a postponed task on the server; this call polls
    /// it to completion and returns the final payload.
    ///
    /// # Errors
    ///
    /// * `TaleError::PollTimeout` - The task did not finish within the poll policy
    /// * `TaleError::UnexpectedResponse` - The server returned neither a result nor a task
    pub fn shop_close_sell_lot(&self, item_type: &str, price: u64) -> Result<Decoded, TaleError> {
        let mut form = FormParams::new();
        form.push("item_type", item_type).push("price", price.to_string());
        let postponed = self.call(ApiMethod::ShopCloseSellLot, &form)?;

        match PendingTask::from_response(&postponed) {
            Some(task) => self.wait_for(&task),
            None if TaskState::of(&postponed) == TaskState::Done => Ok(postponed),
            None => Err(TaleError::UnexpectedResponse(
                "close-sell-lot: processing without `status_url`".to_string(),
            )),
        }
    }

    /// Poll a postponed task until it leaves the processing state
    pub fn wait_for(&self, task: &PendingTask) -> Result<Decoded, TaleError> {
        debug!(status_url = task.status_url(), "waiting for postponed task");
        wait_for_task(&self.core.poll_policy, self.core.sleeper.as_ref(), || {
            let raw = self.core.transport.request(
                task.status_url(),
                HttpVerb::Get,
                &FormParams::new(),
                Some(&self.session),
            )?;
            self.core.transport.decode(&raw)
        })
    }

    /// Hero state
    ///
    /// `client_turns` lists turns the caller already has, letting the server
    /// send only changes; `account_id` selects another player's hero.
    pub fn hero_info(&self, client_turns: &[u64], account_id: Option<u64>) -> Result<Decoded, TaleError> {
        let mut form = FormParams::new();
        if !client_turns.is_empty() {
            let turns: Vec<String> = client_turns.iter().map(u64::to_string).collect();
            form.push("client_turns", turns.join(","));
        }
        if let Some(account_id) = account_id {
            form.push("account_id", account_id.to_string());
        }
        self.call(ApiMethod::HeroInfo, &form)
    }

    /// Use the "help" ability on the hero
    pub fn send_help(&self) -> Result<Decoded, TaleError> {
        self.call(ApiMethod::SendHelp, &FormParams::new())
    }

    /// Cards in the hand
    pub fn cards(&self) -> Result<Decoded, TaleError> {
        self.call(ApiMethod::CardGet, &FormParams::new())
    }

    /// Take the newly accumulated cards
    pub fn receive_cards(&self) -> Result<Decoded, TaleError> {
        self.call(ApiMethod::CardReceive, &FormParams::new())
    }

    /// Combine cards into a new one
    pub fn combine_cards(&self, cards: &[&str]) -> Result<Decoded, TaleError> {
        let mut form = FormParams::new();
        form.push_all("card", cards.iter().copied());
        self.call(ApiMethod::CardCombine, &form)
    }
}

/// Builder for configuring a Tale HTTP client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tale_http_client::{PollPolicy, TaleClient};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Custom base URL for testing
/// let client = TaleClient::builder()
///     .base_url("http://localhost:1234")?
///     .build()?;
///
/// // Faster polling and a request timeout
/// let client = TaleClient::builder()
///     .poll_policy(PollPolicy { interval: Duration::from_millis(100), max_attempts: 50 })
///     .client_builder(
///         reqwest::blocking::Client::builder()
///             .timeout(Duration::from_secs(10))
///     )
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaleClientBuilder {
    base_url: Option<reqwest::Url>,
    api_client: Option<String>,
    poll_policy: PollPolicy,
    sleeper: Option<Arc<dyn Sleeper>>,
    client_builder: Option<reqwest::blocking::ClientBuilder>,
}

impl TaleClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_client: None,
            poll_policy: PollPolicy::default(),
            sleeper: None,
            client_builder: None,
        }
    }

    /// Create a builder from `TALE_*` environment variables
    ///
    /// * `TALE_BASE_URL` - host to talk to
    /// * `TALE_API_CLIENT` - value sent as `api_client`
    /// * `TALE_POLL_INTERVAL` - delay between polls, e.g. `300ms`
    /// * `TALE_POLL_MAX_ATTEMPTS` - poll attempt bound
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, TaleError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, TaleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();

        if let Some(url) = lookup(ENV_BASE_URL) {
            builder = builder.base_url(url.as_str())?;
        }
        if let Some(api_client) = lookup(ENV_API_CLIENT) {
            builder = builder.api_client(api_client);
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL) {
            builder.poll_policy.interval = humantime::parse_duration(raw.trim())
                .map_err(|e| TaleError::DurationParse(format!("{ENV_POLL_INTERVAL}={raw}: {e}")))?;
        }
        if let Some(raw) = lookup(ENV_POLL_MAX_ATTEMPTS) {
            builder.poll_policy.max_attempts = raw.trim().parse().map_err(|_| {
                TaleError::Config(format!("{ENV_POLL_MAX_ATTEMPTS} must be a positive integer, got {raw:?}"))
            })?;
        }

        Ok(builder)
    }

    /// Set a custom base URL for the client
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn base_url(mut self, url: impl reqwest::IntoUrl) -> Result<Self, TaleError> {
        self.base_url = Some(url.into_url()?);
        Ok(self)
    }

    /// Set the identifier sent as `api_client`
    pub fn api_client(mut self, api_client: impl Into<String>) -> Self {
        self.api_client = Some(api_client.into());
        self
    }

    /// Set how postponed tasks are polled
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Replace the sleeper used between polls
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Set a custom HTTP client builder
    ///
    /// The redirect policy will always be overridden to `Policy::none()`.
    pub fn client_builder(mut self, builder: reqwest::blocking::ClientBuilder) -> Self {
        self.client_builder = Some(builder);
        self
    }

    /// Build the client with the configured settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The HTTP client cannot be initialized
    /// - The poll policy allows no attempts
    pub fn build(self) -> Result<TaleClient, TaleError> {
        if self.poll_policy.max_attempts == 0 {
            return Err(TaleError::Config("poll max_attempts must be at least 1".to_string()));
        }

        let base_url = self.base_url.unwrap_or_else(|| {
            reqwest::Url::parse(DEFAULT_BASE_URL).expect("Default base URL should always be valid")
        });

        let builder = self
            .client_builder
            .unwrap_or_else(|| reqwest::blocking::Client::builder().use_rustls_tls());

        let client = builder
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TaleError::ClientInit(e.to_string()))?;

        Ok(TaleClient {
            core: ClientCore {
                transport: Transport::new(client, base_url)?,
                api_client: self.api_client.unwrap_or_else(|| DEFAULT_API_CLIENT.to_string()),
                poll_policy: self.poll_policy,
                sleeper: self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper)),
            },
        })
    }
}

impl Default for TaleClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
