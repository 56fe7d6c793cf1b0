pub mod authorizer;

pub use authorizer::{AuthorizerGateway, HttpAuthorizer, StaticAuthorizer};

#[cfg(test)]
pub use authorizer::MockAuthorizerGateway;
