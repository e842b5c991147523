//! Block assembly controller for the JavaScript host.

use assembler_core::{
    mine_batch, AssemblerConfig, BatchOutcome, BlockAssembler as Assembler, BlockTemplate,
    MiningResult, Transaction, TransactionRecord, ValidationPolicy,
};
use wasm_bindgen::prelude::*;

use crate::state::{
    AcceptanceInfo, BatchInfo, MiningReport, MiningStats, SelectionSummary, TemplateInfo,
};

/// Collects transactions, prepares a header and mines it in host-sized batches.
#[wasm_bindgen]
pub struct BlockAssembler {
    config: AssemblerConfig,
    policy: ValidationPolicy,
    /// Accepted transactions, in submission order.
    transactions: Vec<Transaction>,
    /// The prepared header awaiting a nonce.
    template: Option<BlockTemplate>,
    /// The finished block.
    result: Option<MiningResult>,
    stats: MiningStats,
    /// Start time of mining.
    start_time: f64,
    is_mining: bool,
}

#[wasm_bindgen]
impl BlockAssembler {
    /// Create a controller.
    ///
    /// # Arguments
    /// * `config` - An `AssemblerConfig` object, or `undefined` for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<BlockAssembler, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            AssemblerConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
        };

        Ok(BlockAssembler {
            config,
            policy: ValidationPolicy::default(),
            transactions: Vec::new(),
            template: None,
            result: None,
            stats: MiningStats::new(),
            start_time: 0.0,
            is_mining: false,
        })
    }

    /// Replace the acceptance policy used for subsequently added transactions.
    #[wasm_bindgen]
    pub fn set_policy(&mut self, policy: JsValue) -> Result<(), JsValue> {
        self.policy = serde_wasm_bindgen::from_value(policy)
            .map_err(|e| JsValue::from_str(&format!("Invalid policy: {}", e)))?;
        Ok(())
    }

    /// Validate one mempool record and keep it if accepted.
    #[wasm_bindgen]
    pub fn add_transaction(&mut self, record: JsValue) -> Result<JsValue, JsValue> {
        let record: TransactionRecord = serde_wasm_bindgen::from_value(record)
            .map_err(|e| JsValue::from_str(&format!("Invalid transaction record: {}", e)))?;
        self.ingest(&record).to_js()
    }

    /// Validate a JSON array of mempool records.
    #[wasm_bindgen]
    pub fn add_transactions_json(&mut self, json: &str) -> Result<JsValue, JsValue> {
        let records: Vec<TransactionRecord> = serde_json::from_str(json)
            .map_err(|e| JsValue::from_str(&format!("Invalid transaction JSON: {}", e)))?;

        let mut summary = SelectionSummary::default();
        for record in &records {
            let verdict = self.ingest(record);
            if verdict.accepted {
                summary.accepted += 1;
            } else {
                summary.rejected += 1;
            }
            summary.verdicts.push(verdict);
        }

        console_log(&format!(
            "accepted {} of {} transactions",
            summary.accepted,
            records.len()
        ));
        summary.to_js()
    }

    /// Number of accepted transactions.
    #[wasm_bindgen(getter)]
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Build the header over the accepted transactions.
    ///
    /// # Arguments
    /// * `target_hex` - 64-character big-endian target
    #[wasm_bindgen]
    pub fn prepare(&mut self, target_hex: &str) -> Result<JsValue, JsValue> {
        let mut config = self.config.clone();
        if config.timestamp.is_none() {
            config.timestamp = Some((js_sys::Date::now() / 1000.0) as u32);
        }

        let template = Assembler::new(config)
            .prepare(&self.transactions, target_hex)
            .map_err(|e| JsValue::from_str(&format!("Failed to prepare block: {}", e)))?;

        let info = TemplateInfo::from(&template);
        self.template = Some(template);
        self.result = None;
        self.stats = MiningStats::new();
        self.start_time = 0.0;
        self.is_mining = false;

        info.to_js()
    }

    /// Mine a batch of nonces. Only runs between `start_mining` and `stop_mining`.
    ///
    /// # Arguments
    /// * `batch_size` - Number of nonces to try in this batch
    #[wasm_bindgen]
    pub fn mine_batch(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        self.check_can_mine().map_err(JsValue::from_str)?;
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| JsValue::from_str("No block prepared"))?;

        let outcome = mine_batch(
            &template.header_template(),
            &template.target,
            self.stats.current_nonce,
            batch_size,
        );
        self.stats.record_batch(&outcome);

        if self.start_time > 0.0 {
            self.stats.elapsed_ms = js_sys::Date::now() - self.start_time;
            self.stats.update_hash_rate();
        }

        if let BatchOutcome::Found(solution) = outcome {
            if let Some(template) = self.template.take() {
                let result = template.complete(solution);
                console_log(&format!("found block {}", result.block_hash_display()));
                self.result = Some(result);
                self.is_mining = false;
            }
        }

        BatchInfo::from(&outcome).to_js()
    }

    /// Start mining.
    #[wasm_bindgen]
    pub fn start_mining(&mut self) {
        self.is_mining = true;
        self.start_time = js_sys::Date::now();
    }

    /// Stop mining.
    #[wasm_bindgen]
    pub fn stop_mining(&mut self) {
        self.is_mining = false;
    }

    #[wasm_bindgen(getter)]
    pub fn is_mining(&self) -> bool {
        self.is_mining
    }

    /// Get current mining statistics.
    #[wasm_bindgen]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        self.stats.to_js()
    }

    /// Get the formatted hash rate.
    #[wasm_bindgen]
    pub fn get_hash_rate_display(&self) -> String {
        self.stats.format_hash_rate()
    }

    /// The mined block report, once a nonce has been found.
    #[wasm_bindgen]
    pub fn result(&self) -> Result<JsValue, JsValue> {
        match &self.result {
            Some(result) => MiningReport::from(result).to_js(),
            None => Ok(JsValue::NULL),
        }
    }

    /// The mined 80-byte header as hex, once a nonce has been found.
    #[wasm_bindgen]
    pub fn header_hex(&self) -> Option<String> {
        self.result.as_ref().map(MiningResult::header_hex)
    }

    /// Drop all transactions and mining progress.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.transactions.clear();
        self.template = None;
        self.result = None;
        self.stats = MiningStats::new();
        self.start_time = 0.0;
        self.is_mining = false;
    }
}

impl BlockAssembler {
    fn check_can_mine(&self) -> Result<(), &'static str> {
        if self.result.is_some() {
            return Err("Block already mined");
        }
        if self.stats.nonce_space_exhausted {
            return Err("Nonce space exhausted");
        }
        if self.template.is_none() {
            return Err("No block prepared");
        }
        if !self.is_mining {
            return Err("Mining is stopped");
        }
        Ok(())
    }

    fn ingest(&mut self, record: &TransactionRecord) -> AcceptanceInfo {
        match self.policy.evaluate(record) {
            Ok(tx) => {
                let info = AcceptanceInfo::accepted(&tx.txid());
                self.transactions.push(tx);
                // Any prepared header no longer commits to every transaction
                self.template = None;
                self.is_mining = false;
                info
            }
            Err(reason) => AcceptanceInfo::rejected(&reason),
        }
    }
}

/// Log to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}
