use axum::{
    extract::{Query, State},
    Json,
};

use super::{dispatch, AppState, CurrentUser};
use crate::models::{
    airdrops::AirdropAllocation,
    transactions::{Transaction, TransactionQuery},
    wallets::{LinkWalletAddress, RedeemReward, RedemptionReceipt, Wallet, WalletSummary},
};
use crate::services::{wallets::WalletRequest, ServiceError};

pub async fn get_wallet(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<WalletSummary>, ServiceError> {
    let wallet = dispatch(&state.channels.wallets, |response| WalletRequest::GetWallet {
        user_id: user.id,
        response,
    })
    .await?;

    Ok(Json(wallet.into()))
}

pub async fn get_airdrop(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<AirdropAllocation>, ServiceError> {
    let airdrop = dispatch(&state.channels.wallets, |response| WalletRequest::GetAirdrop {
        user_id: user.id,
        response,
    })
    .await?;

    Ok(Json(airdrop))
}

pub async fn redeem_reward(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(reward): Json<RedeemReward>,
) -> Result<Json<RedemptionReceipt>, ServiceError> {
    let receipt = dispatch(&state.channels.wallets, |response| WalletRequest::Redeem {
        user_id: user.id,
        reward,
        response,
    })
    .await?;

    Ok(Json(receipt))
}

pub async fn generate_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Wallet>, ServiceError> {
    let wallet = dispatch(&state.channels.wallets, |response| {
        WalletRequest::GenerateAddress {
            user_id: user.id,
            response,
        }
    })
    .await?;

    Ok(Json(wallet))
}

pub async fn link_address(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(link): Json<LinkWalletAddress>,
) -> Result<Json<Wallet>, ServiceError> {
    let wallet = dispatch(&state.channels.wallets, |response| WalletRequest::LinkAddress {
        user_id: user.id,
        address: link.address,
        response,
    })
    .await?;

    Ok(Json(wallet))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, ServiceError> {
    let transactions = dispatch(&state.channels.wallets, |response| {
        WalletRequest::ListTransactions {
            user_id: user.id,
            limit: query.page_size(),
            response,
        }
    })
    .await?;

    Ok(Json(transactions))
}
