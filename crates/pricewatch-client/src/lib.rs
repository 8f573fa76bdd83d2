pub mod fetcher;
pub mod notifier;
pub mod parser;
pub mod resolver;

pub use fetcher::ReqwestFetcher;
pub use notifier::WebhookNotifier;
pub use parser::StorefrontParser;
pub use resolver::CachingResolver;
