//! Proposal resolver: reads the four wrapped conditional-outcome tokens, the
//! two base collateral tokens, and a best-effort market name from a proposal
//! contract. All seven reads are fanned out together; the six token reads are
//! mandatory, the name read recovers to a placeholder.

use tracing::debug;

use crate::abi::{enc_uint, selectors, Return};
use crate::config::DEFAULT_MARKET_NAME;
use crate::error::Result;
use crate::rpc::{or_default, EthCall};
use crate::types::ProposalTokens;

/// Read `wrappedOutcome(index)` and decode the token address from the first
/// return word.
async fn wrapped_outcome(client: &dyn EthCall, proposal: &str, index: u64) -> Result<String> {
    let data = format!("{}{}", selectors::WRAPPED_OUTCOME, enc_uint(index));
    let result = client.eth_call(proposal, &data).await?;
    Return::parse(&result)?.address(0)
}

async fn address_getter(client: &dyn EthCall, proposal: &str, selector: &str) -> Result<String> {
    let result = client.eth_call(proposal, selector).await?;
    Return::parse(&result)?.address(0)
}

async fn market_name(client: &dyn EthCall, proposal: &str) -> Result<String> {
    let result = client.eth_call(proposal, selectors::MARKET_NAME).await?;
    Return::parse(&result)?.string(0)
}

/// Resolve all token addresses for a proposal. A failure on any of the six
/// mandatory reads aborts with the propagated error; the market-name read is
/// fault-isolated and substitutes [`DEFAULT_MARKET_NAME`].
pub async fn resolve_proposal(client: &dyn EthCall, proposal: &str) -> Result<ProposalTokens> {
    let (mandatory, market_name) = tokio::join!(
        async {
            tokio::try_join!(
                wrapped_outcome(client, proposal, 0),
                wrapped_outcome(client, proposal, 1),
                wrapped_outcome(client, proposal, 2),
                wrapped_outcome(client, proposal, 3),
                address_getter(client, proposal, selectors::COLLATERAL_TOKEN_1),
                address_getter(client, proposal, selectors::COLLATERAL_TOKEN_2),
            )
        },
        or_default(market_name(client, proposal), DEFAULT_MARKET_NAME.to_string()),
    );

    let (yes_company, no_company, yes_currency, no_currency, company_token, currency_token) =
        mandatory?;

    debug!(
        market = %market_name,
        %yes_company, %no_company, %yes_currency, %no_currency,
        "resolved proposal tokens"
    );

    Ok(ProposalTokens {
        yes_company,
        no_company,
        yes_currency,
        no_currency,
        company_token,
        currency_token,
        market_name,
    })
}
