//! App and MicroService resources, registered under `app.o0w0o.cn/v1`
//! with a status subresource.

mod application;
mod condition;
mod microservice;

pub use self::application::*;
pub use self::condition::*;
pub use self::microservice::*;

pub const GROUP: &str = "app.o0w0o.cn";
pub const V1: &str = "v1";

/// children of an App
pub const APP_LABEL: &str = "app.o0w0o.cn/app";
/// children of a MicroService
pub const SERVICE_LABEL: &str = "app.o0w0o.cn/service";
/// per-version deployments
pub const VERSION_LABEL: &str = "app.o0w0o.cn/version";

/// annotations understood by the nginx ingress controller
pub mod canary_annotations {
    pub const CANARY: &str = "nginx.ingress.kubernetes.io/canary";
    pub const WEIGHT: &str = "nginx.ingress.kubernetes.io/canary-weight";
    pub const BY_HEADER: &str = "nginx.ingress.kubernetes.io/canary-by-header";
    pub const BY_HEADER_VALUE: &str = "nginx.ingress.kubernetes.io/canary-by-header-value";
    pub const BY_COOKIE: &str = "nginx.ingress.kubernetes.io/canary-by-cookie";
}
