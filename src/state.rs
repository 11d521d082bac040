// src/state.rs
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Settings;
use crate::error::{BatchError, FetchError, PortfolioError, ScoreError};
use crate::services::cache::SnapshotCache;
use crate::services::forecast::{calculate_all_forecasts, ForecastTable};
use crate::services::macro_data::{MacroAggregator, MacroRefresh, MacroSymbols};
use crate::services::performance::{score_funds, FundTable, HorizonWeights};
use crate::services::portfolio::{summarize, FundSet, Portfolio, PortfolioSummary};
use crate::services::regime::{RegimeContext, RegimeDetection};
use crate::services::sources::{FundPageSource, QuoteSource};
use crate::services::store::FundStore;
use crate::services::tefas::TefasClient;
use crate::services::throttle::FetchThrottle;
use crate::services::yahoo::YahooClient;

/// Everything the server shares between requests and background tasks.
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<FundStore>,
    pub macro_source: MacroAggregator,
    pub funds: RwLock<Option<FundTable>>,
    pub regime: RwLock<RegimeContext>,
    pub forecasts: RwLock<ForecastTable>,
    pub portfolio: RwLock<Portfolio>,
    batch_cancel: Arc<AtomicBool>,
    quick_busy: AtomicBool,
}

impl AppState {
    /// State wired to the live quote and fund page providers.
    pub fn new(settings: Settings) -> Result<Self, FetchError> {
        let quotes = Arc::new(YahooClient::new()?);
        let pages = Arc::new(TefasClient::new(settings.fund_page_url.clone())?);
        Ok(Self::with_sources(settings, quotes, pages))
    }

    pub fn with_sources(
        settings: Settings,
        quotes: Arc<dyn QuoteSource>,
        pages: Arc<dyn FundPageSource>,
    ) -> Self {
        let cache = SnapshotCache::new(settings.cache_file.clone(), settings.market_tz);
        let store = FundStore::open(
            cache,
            pages,
            Arc::new(FetchThrottle::for_funds(&settings)),
            settings.batch_save_every,
        );
        let macro_source = MacroAggregator::new(quotes, MacroSymbols::default())
            .with_throttle(Arc::new(FetchThrottle::for_macro(&settings)));

        AppState {
            settings,
            store: Arc::new(store),
            macro_source,
            funds: RwLock::new(None),
            regime: RwLock::new(RegimeContext::default()),
            forecasts: RwLock::new(ForecastTable::default()),
            portfolio: RwLock::new(Portfolio::default()),
            batch_cancel: Arc::new(AtomicBool::new(false)),
            quick_busy: AtomicBool::new(false),
        }
    }

    /// Full macro refresh. The snapshot replaces the stored one and is
    /// persisted whenever anything resolved.
    pub async fn refresh_macro(&self) -> MacroRefresh {
        let refresh = self.macro_source.refresh().await;
        if refresh.snapshot.is_empty() {
            warn!("Macro refresh resolved nothing; keeping previous snapshot");
        } else {
            self.store.set_macro_data(refresh.snapshot.clone()).await;
            self.store.persist().await;
        }
        refresh
    }

    /// Quick price/daily refresh. `None` when the previous one is still running.
    pub async fn refresh_macro_quick(&self) -> Option<usize> {
        if self.quick_busy.swap(true, Ordering::SeqCst) {
            return None;
        }
        let quotes = self.macro_source.quick_quotes().await;
        let updated = self.store.apply_quick_quotes(&quotes).await;
        self.quick_busy.store(false, Ordering::SeqCst);
        Some(updated)
    }

    pub async fn detect_regime(&self) -> RegimeDetection {
        let snapshot = self.store.macro_data().await;
        self.regime.write().await.detect(&snapshot).clone()
    }

    pub async fn import_funds(&self, table: FundTable) {
        info!("Fund table replaced: {} funds", table.len());
        *self.funds.write().await = Some(table);
        *self.forecasts.write().await = ForecastTable::default();
    }

    pub async fn score_funds(&self, weights: &HorizonWeights) -> Result<FundTable, ScoreError> {
        let mut funds = self.funds.write().await;
        let table = funds.as_mut().ok_or(ScoreError::NoFunds)?;
        score_funds(table, weights)?;
        Ok(table.clone())
    }

    /// Forecast every loaded fund against the stored macro snapshot.
    pub async fn calculate_forecasts(&self) -> Result<ForecastTable, ScoreError> {
        let funds = self.funds.read().await;
        let table = funds.as_ref().ok_or(ScoreError::NoFunds)?;
        let allocations = self.store.allocations().await;
        let snapshot = self.store.macro_data().await;

        let forecasts = {
            let mut ctx = self.regime.write().await;
            calculate_all_forecasts(&mut ctx, table, &allocations, &snapshot)
        };
        *self.forecasts.write().await = forecasts.clone();
        Ok(forecasts)
    }

    /// Start a background batch fetch over the loaded fund codes.
    /// Returns how many codes were queued.
    pub async fn start_batch_fetch(self: &Arc<Self>) -> Result<usize, BatchError> {
        let codes = match self.funds.read().await.as_ref() {
            Some(table) if !table.is_empty() => table.codes(),
            _ => return Err(BatchError::NoFunds),
        };
        let guard = self.store.try_begin_batch().ok_or(BatchError::AlreadyRunning)?;
        self.batch_cancel.store(false, Ordering::SeqCst);

        let queued = codes.len();
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = state.store.batch_fetch(guard, &codes, &state.batch_cancel).await;
            if outcome.cancelled {
                info!("Batch fetch stopped on request");
            }
        });
        Ok(queued)
    }

    pub fn cancel_batch_fetch(&self) -> bool {
        self.batch_cancel.store(true, Ordering::SeqCst);
        self.store.is_batch_running()
    }

    pub async fn set_portfolio(&self, portfolio: Portfolio) -> Result<Portfolio, PortfolioError> {
        let portfolio = portfolio.normalized()?;
        let total = portfolio.distribution_total(FundSet::Current);
        if total > 0.0 && (total - 100.0).abs() > 1.0 {
            warn!("Current fund distribution sums to {:.1}%", total);
        }
        *self.portfolio.write().await = portfolio.clone();
        Ok(portfolio)
    }

    pub async fn equalize_portfolio(&self, set: FundSet) -> Result<Portfolio, PortfolioError> {
        let mut portfolio = self.portfolio.write().await;
        portfolio.equalize(set)?;
        info!("Distributed {} funds evenly", set.name());
        Ok(portfolio.clone())
    }

    pub async fn portfolio_summary(&self, set: FundSet) -> PortfolioSummary {
        let allocations = self.store.allocations().await;
        let daily = self.store.daily_returns().await;
        let portfolio = self.portfolio.read().await;
        let funds = self.funds.read().await;
        summarize(&portfolio, set, funds.as_ref(), &allocations, &daily)
    }

    pub async fn clear_cache(&self) {
        self.store.clear().await;
        *self.forecasts.write().await = ForecastTable::default();
    }

    /// Full refresh once unless today's snapshot already has macro data,
    /// then quick refreshes on the configured period.
    pub async fn run_macro_auto_refresh(self: Arc<Self>) {
        if self.store.macro_data().await.is_empty() {
            let refresh = self.refresh_macro().await;
            if !refresh.errors.is_empty() {
                error!("Unresolved macro symbols: {}", refresh.unresolved_names().join(", "));
            }
        }

        let Some(period) = self.settings.macro_auto_refresh else {
            info!("Macro auto-refresh disabled");
            return;
        };

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.refresh_macro_quick().await {
                Some(updated) => debug!("Quick macro refresh updated {} symbols", updated),
                None => debug!("Quick macro refresh still running, skipped"),
            }
        }
    }
}
