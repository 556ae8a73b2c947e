//! Traits for abstracting away application context

use crate::{
    authorizer::TokenAuthorizer, credits::CreditLedger, payment::VnpayGateway, ImagifyCtx,
};

pub trait GetAuthorizer {
    fn get_authorizer(&self) -> &TokenAuthorizer;
}

pub trait GetPaymentGateway {
    fn get_payment_gateway(&self) -> &VnpayGateway;
}

pub trait GetCreditLedger {
    fn get_credit_ledger(&self) -> &dyn CreditLedger;
}

impl GetAuthorizer for ImagifyCtx {
    fn get_authorizer(&self) -> &TokenAuthorizer {
        &self.authorizer
    }
}

impl GetPaymentGateway for ImagifyCtx {
    fn get_payment_gateway(&self) -> &VnpayGateway {
        &self.gateway
    }
}

impl GetCreditLedger for ImagifyCtx {
    fn get_credit_ledger(&self) -> &dyn CreditLedger {
        self.ledger.as_ref()
    }
}
