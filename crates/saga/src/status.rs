//! Saga status tokens.

use serde::{Deserialize, Serialize};

/// The state-machine discriminator carried by every saga message.
///
/// `PROCEED_*` tokens mark a message in flight toward a step handler;
/// `SUCCESS_*`/`FAIL_*` tokens are step outcomes awaiting a routing
/// decision. Serialized as the original SCREAMING_SNAKE_CASE wire
/// tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    ProceedConfirmOrderForm,
    SuccessConfirmOrderForm,
    FailConfirmOrderForm,

    ProceedDeleteCart,

    ProceedApplyCoupon,
    SuccessApplyCoupon,
    FailApplyCoupon,

    ProceedPointDecrement,
    SuccessPointDecrement,
    FailPointDecrement,

    ProceedApprovePayment,
    SuccessApprovePayment,
    FailApprovePayment,

    ProceedSaveOrdersDatabase,
    SuccessSaveOrdersDatabase,
    FailSaveOrdersDatabase,

    ProceedEarnPoint,
    SuccessEarnPoint,
    FailEarnPoint,

    /// Terminal success of the whole saga.
    SuccessAllOrderSaga,

    /// A compensation itself failed; dead-lettered for the operator.
    FailCompensateConfirmOrderForm,

    /// Envelope status for post-success cancellation fan-out.
    ProceedRequestPayCancel,
}

impl SagaStatus {
    /// Returns true for step-failure outcomes.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SagaStatus::FailConfirmOrderForm
                | SagaStatus::FailApplyCoupon
                | SagaStatus::FailPointDecrement
                | SagaStatus::FailApprovePayment
                | SagaStatus::FailSaveOrdersDatabase
                | SagaStatus::FailEarnPoint
                | SagaStatus::FailCompensateConfirmOrderForm
        )
    }

    /// Returns true if no further routing decision follows this token.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::SuccessAllOrderSaga | SagaStatus::FailCompensateConfirmOrderForm
        )
    }

    /// Returns the wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::ProceedConfirmOrderForm => "PROCEED_CONFIRM_ORDER_FORM",
            SagaStatus::SuccessConfirmOrderForm => "SUCCESS_CONFIRM_ORDER_FORM",
            SagaStatus::FailConfirmOrderForm => "FAIL_CONFIRM_ORDER_FORM",
            SagaStatus::ProceedDeleteCart => "PROCEED_DELETE_CART",
            SagaStatus::ProceedApplyCoupon => "PROCEED_APPLY_COUPON",
            SagaStatus::SuccessApplyCoupon => "SUCCESS_APPLY_COUPON",
            SagaStatus::FailApplyCoupon => "FAIL_APPLY_COUPON",
            SagaStatus::ProceedPointDecrement => "PROCEED_POINT_DECREMENT",
            SagaStatus::SuccessPointDecrement => "SUCCESS_POINT_DECREMENT",
            SagaStatus::FailPointDecrement => "FAIL_POINT_DECREMENT",
            SagaStatus::ProceedApprovePayment => "PROCEED_APPROVE_PAYMENT",
            SagaStatus::SuccessApprovePayment => "SUCCESS_APPROVE_PAYMENT",
            SagaStatus::FailApprovePayment => "FAIL_APPROVE_PAYMENT",
            SagaStatus::ProceedSaveOrdersDatabase => "PROCEED_SAVE_ORDERS_DATABASE",
            SagaStatus::SuccessSaveOrdersDatabase => "SUCCESS_SAVE_ORDERS_DATABASE",
            SagaStatus::FailSaveOrdersDatabase => "FAIL_SAVE_ORDERS_DATABASE",
            SagaStatus::ProceedEarnPoint => "PROCEED_EARN_POINT",
            SagaStatus::SuccessEarnPoint => "SUCCESS_EARN_POINT",
            SagaStatus::FailEarnPoint => "FAIL_EARN_POINT",
            SagaStatus::SuccessAllOrderSaga => "SUCCESS_ALL_ORDER_SAGA",
            SagaStatus::FailCompensateConfirmOrderForm => "FAIL_COMPENSATE_CONFIRM_ORDER_FORM",
            SagaStatus::ProceedRequestPayCancel => "PROCEED_REQUEST_PAY_CANCEL",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
