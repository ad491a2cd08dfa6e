use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Время жизни открытого экрана.
///
/// Результаты запросов, завершившихся после закрытия экрана, отбрасываются,
/// а не применяются к устаревшему состоянию.
#[derive(Debug, Clone)]
pub struct ViewScope {
    mounted: Arc<watch::Sender<bool>>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    /// Открывает экран.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self {
            mounted: Arc::new(tx),
        }
    }

    /// Закрывает экран. Все копии скоупа видят закрытие.
    pub fn unmount(&self) {
        self.mounted.send_replace(false);
        tracing::debug!("view unmounted");
    }

    /// Экран ещё открыт.
    pub fn is_mounted(&self) -> bool {
        *self.mounted.borrow()
    }

    /// Выполняет `fut`, пока экран открыт.
    ///
    /// Возвращает `None`, если экран закрыли до или во время выполнения;
    /// незавершённый `fut` при этом сбрасывается.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut rx = self.mounted.subscribe();
        if !*rx.borrow_and_update() {
            return None;
        }

        tokio::select! {
            output = fut => {
                if self.is_mounted() {
                    Some(output)
                } else {
                    tracing::debug!("result arrived after unmount, discarded");
                    None
                }
            }
            _ = unmounted(&mut rx) => None,
        }
    }
}

async fn unmounted(rx: &mut watch::Receiver<bool>) {
    while rx.changed().await.is_ok() {
        if !*rx.borrow_and_update() {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn mounted_scope_returns_result() {
        let scope = ViewScope::new();
        assert_eq!(scope.run(async { 42 }).await, Some(42));
    }

    #[tokio::test]
    async fn unmounted_scope_skips_work() {
        let scope = ViewScope::new();
        scope.unmount();

        let mut polled = false;
        let result = scope
            .run(async {
                polled = true;
            })
            .await;
        assert!(result.is_none());
        assert!(!polled);
    }

    #[tokio::test]
    async fn result_after_unmount_is_discarded() {
        let scope = ViewScope::new();
        let (tx, rx) = oneshot::channel::<i64>();

        let view = scope.clone();
        let pending = tokio::spawn(async move { view.run(async { rx.await.ok() }).await });

        tokio::task::yield_now().await;
        scope.unmount();
        let _ = tx.send(7);

        let outcome = pending.await.expect("task must not panic");
        assert!(outcome.is_none());
        assert!(!scope.is_mounted());
    }
}
