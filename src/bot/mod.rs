//! Chat-bot command access control.
//!
//! Incoming commands pass the [`AuthorizationGate`] (identity, then rate),
//! destructive ones are parked until confirmed, and admitted ones are handed
//! to the action layer by the [`CommandDispatcher`].

mod confirm;
mod dispatcher;
mod gate;
mod request;

pub use confirm::{
    confirm_data, CallbackAction, ConfirmationPolicy, PendingConfirmation, PendingConfirmations,
    CANCEL_DATA, CONFIRM_PREFIX,
};
pub use dispatcher::{
    BotReply, CommandDispatcher, CALLBACK_UNAUTHORIZED_REPLY, CANCELLED_REPLY, FAILURE_REPLY,
    NOTHING_PENDING_REPLY, RATE_LIMITED_REPLY, UNAUTHORIZED_REPLY,
};
pub use gate::{AuthorizationGate, Flow, GateDecision, IdentityCheck, Interceptor, RateCheck};
pub use request::{is_command_name, BotRequest, Caller, ParsedCommand, UserId};
