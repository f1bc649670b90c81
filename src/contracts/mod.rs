mod abi;
mod caller;
mod deployment;

pub use abi::{CallValue, coerce_args, find_function, format_scaled_list, format_value};
pub use caller::{AlloyClient, ContractBackend, ContractHandle, TxOptions, TxReceipt};
pub use deployment::{
    AbiResolver, ArtifactStore, DeploymentRequest, DeploymentResult, DeploymentService,
};
