pub mod domain_policy;
pub mod url_safety;

pub use domain_policy::DomainPolicy;
pub use url_safety::UrlSafetyGuard;
