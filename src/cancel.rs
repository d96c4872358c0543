//! キャンセル・タイムアウト制御
//!
//! カタログ検索や画像取得などネットワーク待ちの処理は、
//! すべて `CancelContext::run` を通して呼び出す。
//! 中断時は `MoxError::Canceled` / `MoxError::TimedOut` を返し、
//! 通信エラーや「該当なし」と区別できるようにする。

use crate::error::{MoxError, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// 外部から発行されるキャンセル信号
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// キャンセルされるまで待つ
    pub async fn canceled(&self) {
        loop {
            // フラグ確認より先に登録しておかないと通知を取りこぼす
            let notified = self.inner.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

/// 呼び出し側が渡すキャンセル信号とタイムアウト
#[derive(Debug, Clone)]
pub struct CancelContext {
    token: CancelToken,
    timeout: Duration,
}

impl CancelContext {
    pub fn new(token: CancelToken, timeout: Duration) -> Self {
        Self { token, timeout }
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// キャンセル済みなら即座に `Canceled`
    pub fn check(&self) -> Result<()> {
        if self.token.is_canceled() {
            Err(MoxError::Canceled)
        } else {
            Ok(())
        }
    }

    /// キャンセル・タイムアウトと競争させて処理を実行
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        tokio::select! {
            _ = self.token.canceled() => Err(MoxError::Canceled),
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(MoxError::TimedOut(self.timeout.as_secs())),
            },
        }
    }
}

impl Default for CancelContext {
    fn default() -> Self {
        Self::new(CancelToken::new(), Duration::from_secs(30))
    }
}
