// SPDX-License-Identifier: Apache-2.0

//! Ports for the third-party collaborators this service proxies. Each port
//! has a reqwest adapter speaking the provider's wire shape and an
//! in-process fake used by the tests.

mod completion;
mod fakes;
mod identity;
mod news;
mod paystack;
mod weather;

pub use completion::{ChatCompletionsClient, CompletionClient, CompletionRequest};
pub use fakes::{FakeCompletion, FakeGateway, FakeIdentity, FakeNews, FakeWeather};
pub use identity::{AuthUser, HttpIdentityProvider, IdentityProvider};
pub use news::{NewsProvider, SerpNewsClient};
pub use paystack::{GatewayVerification, InitializedTransaction, PaymentGateway, PaystackGateway};
pub use weather::{OpenWeatherClient, WeatherProvider};

use std::fmt::{Display, Formatter};

/// A provider call failed: non-success status, transport error, or a
/// payload that does not carry the promised fields. The detail stays in
/// server logs; clients get the generic taxonomy message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError(pub String);

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UpstreamError {}
