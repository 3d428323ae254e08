pub mod body_builder;
pub mod compiler;
pub mod config;
pub mod executor;
pub mod headers;
pub mod mapper;
pub mod path;
pub mod timeout_manager;
pub mod url_builder;
pub mod validator;

pub use compiler::{CompiledRequest, RequestCompiler};
pub use config::{
    ApiKeyLocation, AuthSpec, BodyType, FormField, Method, OutputMapping, OutputSlot,
    RequestConfig,
};
pub use executor::{ExecutionResult, HttpExecutor, ReqwestExecutor};
pub use headers::HeaderList;
pub use mapper::ReturnValues;
