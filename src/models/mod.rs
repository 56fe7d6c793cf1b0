pub mod charge;
pub mod cpf;
pub mod user;

pub use charge::{
    Charge, ChargeStateMachine, ChargeStatus, InvalidTransition, PaymentMethod, Settlement,
};
pub use cpf::{Cpf, InvalidCpf};
pub use user::{InsufficientFundsError, User};
