//! Static registry of Tale API methods and URL construction

use crate::error::TaleError;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\w+)%").unwrap());

/// HTTP verb used by an API method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verb, path template and API version of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// HTTP verb
    pub verb: HttpVerb,
    /// Path relative to the host; may contain `%name%` placeholders
    pub path_template: &'static str,
    /// Value sent as `api_version`
    pub api_version: &'static str,
}

impl MethodDescriptor {
    const fn new(verb: HttpVerb, path_template: &'static str, api_version: &'static str) -> Self {
        Self {
            verb,
            path_template,
            api_version,
        }
    }

    /// Build the relative URL for this method
    ///
    /// Every `%name%` placeholder is replaced by the matching value from
    /// `path_params`, then `api_version` and `api_client` are appended as the
    /// query string.
    ///
    /// # Errors
    ///
    /// Returns `TaleError::MissingPathParam` if a placeholder has no value.
    ///
    /// # Example
    ///
    /// ```
    /// use tale_http_client::ApiMethod;
    ///
    /// let url = ApiMethod::AccountInfo
    ///     .descriptor()
    ///     .build_url(&[("accountId", "42")], "my-app")
    ///     .unwrap();
    /// assert_eq!(url, "/accounts/42/api/show?api_version=1.0&api_client=my-app");
    /// ```
    pub fn build_url(&self, path_params: &[(&str, &str)], api_client: &str) -> Result<String, TaleError> {
        let path = substitute_placeholders(self.path_template, path_params)?;
        let client: String = url::form_urlencoded::byte_serialize(api_client.as_bytes()).collect();
        Ok(format!(
            "{path}?api_version={}&api_client={client}",
            self.api_version
        ))
    }
}

/// Replace `%name%` placeholders in `template`, leaving everything else untouched
fn substitute_placeholders(template: &str, params: &[(&str, &str)]) -> Result<String, TaleError> {
    let lookup = |name: &str| {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    };

    if let Some(missing) = PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .find(|name| lookup(name).is_none())
    {
        return Err(TaleError::MissingPathParam(missing));
    }

    Ok(PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            lookup(&caps[1]).unwrap_or_default().to_string()
        })
        .into_owned())
}

/// Every operation the client knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMethod {
    /// Password login; answers with session cookies
    Login,
    /// Ask the user to authorise this application
    AuthRequest,
    /// State of a pending third-party authorisation
    AuthState,
    /// End the current session
    AuthLogout,
    /// Public profile of an account, by `%accountId%`
    AccountInfo,
    /// Count of unread personal messages
    NewMessagesNumber,
    /// Server-wide game information
    GameInfo,
    /// Market overview
    ShopInfo,
    /// Lot prices for one item type
    ShopItemPrices,
    /// Put cards up for sale
    ShopCreateSellLot,
    /// Withdraw an own lot
    ShopCancelSellLot,
    /// Buy a lot; usually finishes as a postponed task
    ShopCloseSellLot,
    /// Hero and turn state of an account
    HeroInfo,
    /// Use the help ability on the hero
    SendHelp,
    /// Cards in the hand
    CardGet,
    /// Take cards accumulated since the last call
    CardReceive,
    /// Combine cards into a new one
    CardCombine,
}

impl ApiMethod {
    pub const ALL: [ApiMethod; 17] = [
        ApiMethod::Login,
        ApiMethod::AuthRequest,
        ApiMethod::AuthState,
        ApiMethod::AuthLogout,
        ApiMethod::AccountInfo,
        ApiMethod::NewMessagesNumber,
        ApiMethod::GameInfo,
        ApiMethod::ShopInfo,
        ApiMethod::ShopItemPrices,
        ApiMethod::ShopCreateSellLot,
        ApiMethod::ShopCancelSellLot,
        ApiMethod::ShopCloseSellLot,
        ApiMethod::HeroInfo,
        ApiMethod::SendHelp,
        ApiMethod::CardGet,
        ApiMethod::CardReceive,
        ApiMethod::CardCombine,
    ];

    /// Static descriptor for this operation
    pub const fn descriptor(self) -> MethodDescriptor {
        use HttpVerb::{Get, Post};
        match self {
            ApiMethod::Login => MethodDescriptor::new(Post, "/accounts/auth/api/login", "1.0"),
            ApiMethod::AuthRequest => MethodDescriptor::new(
                Post,
                "/accounts/third-party/tokens/api/request-authorisation",
                "1.0",
            ),
            ApiMethod::AuthState => MethodDescriptor::new(
                Get,
                "/accounts/third-party/tokens/api/authorisation-state",
                "1.0",
            ),
            ApiMethod::AuthLogout => MethodDescriptor::new(Post, "/accounts/auth/api/logout", "1.0"),
            ApiMethod::AccountInfo => MethodDescriptor::new(Get, "/accounts/%accountId%/api/show", "1.0"),
            ApiMethod::NewMessagesNumber => {
                MethodDescriptor::new(Get, "/accounts/messages/api/new-messages-number", "1.0")
            }
            ApiMethod::GameInfo => MethodDescriptor::new(Get, "/api/info", "1.0"),
            ApiMethod::ShopInfo => MethodDescriptor::new(Get, "/shop/info", "0.0"),
            ApiMethod::ShopItemPrices => MethodDescriptor::new(Get, "/shop/item-type-prices", "0.0"),
            ApiMethod::ShopCreateSellLot => MethodDescriptor::new(Post, "/shop/create-sell-lot", "0.0"),
            ApiMethod::ShopCancelSellLot => MethodDescriptor::new(Post, "/shop/cancel-sell-lot", "0.0"),
            ApiMethod::ShopCloseSellLot => MethodDescriptor::new(Post, "/shop/close-sell-lot", "0.0"),
            ApiMethod::HeroInfo => MethodDescriptor::new(Get, "/game/api/info", "1.9"),
            ApiMethod::SendHelp => MethodDescriptor::new(Post, "/game/abilities/help/api/use", "1.0"),
            ApiMethod::CardGet => MethodDescriptor::new(Get, "/game/cards/api/get-cards", "2.0"),
            ApiMethod::CardReceive => MethodDescriptor::new(Post, "/game/cards/api/receive", "1.0"),
            ApiMethod::CardCombine => MethodDescriptor::new(Post, "/game/cards/api/combine", "2.0"),
        }
    }

    /// Logical operation name, as used in logs
    pub fn name(self) -> &'static str {
        match self {
            ApiMethod::Login => "login",
            ApiMethod::AuthRequest => "authRequest",
            ApiMethod::AuthState => "authState",
            ApiMethod::AuthLogout => "authLogout",
            ApiMethod::AccountInfo => "accountInfo",
            ApiMethod::NewMessagesNumber => "newMessagesNumber",
            ApiMethod::GameInfo => "gameInfo",
            ApiMethod::ShopInfo => "shopInfo",
            ApiMethod::ShopItemPrices => "shopItemPrices",
            ApiMethod::ShopCreateSellLot => "shopCreateSellLot",
            ApiMethod::ShopCancelSellLot => "shopCancelSellLot",
            ApiMethod::ShopCloseSellLot => "shopCloseSellLot",
            ApiMethod::HeroInfo => "heroInfo",
            ApiMethod::SendHelp => "sendHelp",
            ApiMethod::CardGet => "cardGet",
            ApiMethod::CardReceive => "cardReceive",
            ApiMethod::CardCombine => "cardCombine",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_static_urls_get_version_and_client() {
        let url = ApiMethod::HeroInfo.descriptor().build_url(&[], "client-1.0").unwrap();
        assert_eq!(url, "/game/api/info?api_version=1.9&api_client=client-1.0");

        let url = ApiMethod::ShopInfo.descriptor().build_url(&[], "client-1.0").unwrap();
        assert_eq!(url, "/shop/info?api_version=0.0&api_client=client-1.0");
    }

    #[test]
    fn test_missing_placeholder_value() {
        let result = ApiMethod::AccountInfo.descriptor().build_url(&[], "client");
        match result {
            Err(TaleError::MissingPathParam(name)) => assert_eq!(name, "accountId"),
            other => panic!("Expected MissingPathParam, got {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_params_are_ignored() {
        let url = ApiMethod::GameInfo
            .descriptor()
            .build_url(&[("accountId", "7")], "client")
            .unwrap();
        assert_eq!(url, "/api/info?api_version=1.0&api_client=client");
    }

    #[test]
    fn test_registry_verbs() {
        let posts: Vec<_> = ApiMethod::ALL
            .iter()
            .filter(|m| m.descriptor().verb == HttpVerb::Post)
            .map(|m| m.name())
            .collect();
        assert_eq!(
            posts,
            vec![
                "login",
                "authRequest",
                "authLogout",
                "shopCreateSellLot",
                "shopCancelSellLot",
                "shopCloseSellLot",
                "sendHelp",
                "cardReceive",
                "cardCombine",
            ]
        );
    }

    #[test]
    fn test_only_account_info_has_placeholder() {
        for method in ApiMethod::ALL {
            let has_placeholder = method.descriptor().path_template.contains('%');
            assert_eq!(has_placeholder, method == ApiMethod::AccountInfo, "{}", method.name());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_placeholder_substitution_is_local(
            prefix in "[a-z/_-]{0,12}",
            suffix in "[a-z/_-]{0,12}",
            value in "[A-Za-z0-9_$.-]{1,16}",
        ) {
            let template = format!("{prefix}%accountId%{suffix}");
            let path = substitute_placeholders(&template, &[("accountId", &value)]).unwrap();
            prop_assert_eq!(path, format!("{prefix}{value}{suffix}"));
        }
    }
}
