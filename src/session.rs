use log::{debug, info};
use reqwest::blocking::Client;
use scraper::{Html, Selector};

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::query::InvoiceQuery;

pub const LOGIN_URL: &str = "https://ec.coopdeli.jp/auth/login.html";
pub const INVOICE_URL: &str = "https://ec.coopdeli.jp/mypage/delivery/daily_detail.html";

pub const TOKEN_FIELD: &str = "$csrfToken";
const TOKEN_SELECTOR: &str = "input[name='$csrfToken']";
pub const LOGIN_PAGE_ID: &str = "WCSBFE15";
pub const INVOICE_PAGE_ID: &str = "WEKPEA0740";
/// Delivery customer code sent with every invoice request.
pub const CUSTOMER_CODE: &str = "9100299751";

/// Anything that can hand back the invoice HTML for one day.
pub trait InvoiceSource {
    fn fetch_invoice(&mut self, query: &InvoiceQuery) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login: String,
    pub invoice: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            login: LOGIN_URL.to_string(),
            invoice: INVOICE_URL.to_string(),
        }
    }
}

/// A logged-in client. Cookies live in the client's store, so every request
/// made through it carries the session.
pub struct Session {
    client: Client,
    endpoints: Endpoints,
}

impl Session {
    pub fn login(credentials: &Credentials) -> Result<Self> {
        Session::login_at(Endpoints::default(), credentials)
    }

    pub fn login_at(endpoints: Endpoints, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder().cookie_store(true).build()?;

        debug!("fetching login page {}", endpoints.login);
        let page = client.get(&endpoints.login).send()?.text()?;
        let token = find_token(&page)?;

        let form = [
            ("j_username", credentials.username.as_str()),
            ("j_password", credentials.password.as_str()),
            ("action", ""),
            ("PageID", LOGIN_PAGE_ID),
            ("successuri", ""),
            (TOKEN_FIELD, token.as_str()),
        ];
        let response = client.post(&endpoints.login).form(&form).send()?;
        if !response.status().is_success() {
            return Err(Error::LoginRejected(response.status()));
        }
        info!("logged in as {}", credentials.username);

        Ok(Session { client, endpoints })
    }
}

impl InvoiceSource for Session {
    /// The response status is not checked; whatever body comes back is parsed.
    fn fetch_invoice(&mut self, query: &InvoiceQuery) -> Result<String> {
        let key = query.key();
        debug!("fetching invoice for {} ({})", query.date, key);
        let form = [
            ("PageID", INVOICE_PAGE_ID),
            ("dcd", CUSTOMER_CODE),
            ("swn", key.as_str()),
        ];
        let body = self
            .client
            .post(&self.endpoints.invoice)
            .form(&form)
            .send()?
            .text()?;
        Ok(body)
    }
}

/// Reads the anti-forgery token out of the login form.
pub fn find_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(TOKEN_SELECTOR).expect("token selector is valid");
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_owned)
        .ok_or(Error::MissingToken)
}

#[test]
fn token_from_login_form() {
    let html = r#"<form action="/auth/login.html" method="post">
        <input type="text" name="j_username">
        <input type="password" name="j_password">
        <input type="hidden" name="$csrfToken" value="a1b2c3">
        </form>"#;
    assert_eq!(find_token(html).unwrap(), "a1b2c3");
}

#[test]
fn token_missing() {
    let html = r#"<form><input type="hidden" name="csrf" value="x"></form>"#;
    assert!(matches!(find_token(html), Err(Error::MissingToken)));

    let html = r#"<form><input type="hidden" name="$csrfToken"></form>"#;
    assert!(matches!(find_token(html), Err(Error::MissingToken)));
}

#[test]
fn token_selector_matches_field() {
    assert!(Selector::parse(TOKEN_SELECTOR).is_ok());
    assert_eq!(TOKEN_SELECTOR, format!("input[name='{}']", TOKEN_FIELD));
}

#[test]
fn default_endpoints() {
    let endpoints = Endpoints::default();
    assert_eq!(endpoints.login, LOGIN_URL);
    assert_eq!(endpoints.invoice, INVOICE_URL);
}
