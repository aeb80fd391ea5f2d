//! Keyword Scorer
//!
//! Scores a question against two bilingual (Indonesian / English) keyword sets:
//! - Data: the question needs figures from the transaction records
//!   (e.g. "Berapa penjualan warung kopi bulan ini?")
//! - Advice: the question asks for guidance (e.g. "Tips untuk meningkatkan penjualan")
//!
//! Matching is case-insensitive substring matching, so the lists are curated to
//! avoid short fragments that hide inside unrelated words.

use serde::{Deserialize, Serialize};

const DATA_KEYWORDS: &[&str] = &[
    // Sales and revenue
    "penjualan", "omzet", "pendapatan", "untung", "keuntungan", "laba",
    "sales", "revenue", "profit", "income", "earnings", "turnover",
    // Transactions
    "transaksi", "terjual", "transaction", "sold", "purchase",
    // Products and stock
    "produk", "barang", "laris", "stok", "dagangan",
    "product", "goods", "best selling", "stock", "inventory",
    // Business units
    "warung", "warung kopi", "warung sayur", "warung sembako",
    "kopi gembira", "sayur sehat", "sayur buah sehat", "sembako berkah",
    "coffee shop", "vegetable store", "grocery store",
    "all businesses", "each business",
    "semua warung", "setiap warung", "ketiga warung", "masing-masing warung",
    "breakdown", "gembira", "sehat", "berkah", "bisnis", "business", "usaha",
    // Periods
    "bulan", "tahun", "minggu", "tanggal", "periode", "kuartal",
    "month", "year", "week", "quarter",
    // Reporting
    "laporan", "statistik", "performa", "kinerja",
    "report", "statistics", "performance", "metrics",
    // Payments and expenses
    "pembayaran", "tunai", "qris", "payment", "cash",
    "pengeluaran", "biaya", "expense", "cost", "spending",
    // Customers
    "pelanggan", "konsumen", "pembeli", "customer", "buyer",
    "tren", "trend",
    // Quantities
    "berapa", "jumlah", "total", "how much", "how many", "amount", "quantity",
    "tertinggi", "terendah", "terbanyak", "tersedikit", "highest", "lowest",
    "rata-rata", "average", "kategori", "category",
    // Movement
    "naik", "turun", "menurun", "increase", "decrease", "growth", "decline",
    // Comparison
    "dibanding", "versus", "bandingkan", "compare",
    // Relative dates
    "kemarin", "hari ini", "minggu lalu", "bulan lalu", "tahun ini", "tahun lalu",
    "yesterday", "today", "last week", "last month", "this year", "last year",
    "2023", "2024",
];

/// Business-unit names: a hit here is worth two points.
const DATA_STRONG_KEYWORDS: &[&str] = &["warung", "gembira", "sehat", "berkah"];

const ADVICE_KEYWORDS: &[&str] = &[
    // Advice
    "tips", "saran", "nasihat", "advice", "suggest", "recommend",
    "strategi", "strategy", "cara", "bagaimana cara",
    "rekomendasi", "recommendation", "sebaiknya", "should",
    // Improvement
    "cara meningkatkan", "how to improve", "bagaimana agar", "how to",
    "meningkatkan", "improve", "memperbaiki", "enhance",
    "optimasi", "optimize", "maksimalkan", "maximize",
    // General business practice
    "manajemen", "management", "kepemimpinan", "leadership",
    "pemasaran", "marketing", "promosi", "promotion", "iklan", "advertising",
    "pelayanan", "customer service", "layanan pelanggan",
];

const ADVICE_STRONG_KEYWORDS: &[&str] =
    &["tips", "saran", "advice", "cara meningkatkan", "how to improve"];

/// Keyword lists and weights. Loaded from the routing profile, so the lists
/// can grow without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub data_keywords: Vec<String>,
    pub data_strong_keywords: Vec<String>,
    pub advice_keywords: Vec<String>,
    pub advice_strong_keywords: Vec<String>,
    /// Extra points for a strong data keyword on top of the base point
    pub data_strong_bonus: u32,
    /// Extra points for a strong advice keyword on top of the base point
    pub advice_strong_bonus: u32,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            data_keywords: to_owned(DATA_KEYWORDS),
            data_strong_keywords: to_owned(DATA_STRONG_KEYWORDS),
            advice_keywords: to_owned(ADVICE_KEYWORDS),
            advice_strong_keywords: to_owned(ADVICE_STRONG_KEYWORDS),
            data_strong_bonus: 1,
            advice_strong_bonus: 1,
        }
    }
}

fn to_owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn normalize(words: &[String]) -> Vec<String> {
    let mut out: Vec<String> = words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// One weighted keyword list.
#[derive(Debug, Clone)]
struct WeightedList {
    keywords: Vec<String>,
    strong: Vec<String>,
    bonus: u32,
}

impl WeightedList {
    fn new(keywords: &[String], strong: &[String], bonus: u32) -> Self {
        Self {
            keywords: normalize(keywords),
            strong: normalize(strong),
            bonus,
        }
    }

    fn score(&self, lowered: &str) -> u32 {
        self.keywords
            .iter()
            .filter(|kw| lowered.contains(kw.as_str()))
            .map(|kw| {
                if self.strong.contains(kw) {
                    1 + self.bonus
                } else {
                    1
                }
            })
            .sum()
    }
}

/// Stateless keyword scorer
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    data: WeightedList,
    advice: WeightedList,
}

impl KeywordScorer {
    pub fn new(config: &KeywordConfig) -> Self {
        Self {
            data: WeightedList::new(
                &config.data_keywords,
                &config.data_strong_keywords,
                config.data_strong_bonus,
            ),
            advice: WeightedList::new(
                &config.advice_keywords,
                &config.advice_strong_keywords,
                config.advice_strong_bonus,
            ),
        }
    }

    /// Structured-data score
    pub fn score_data(&self, text: &str) -> u32 {
        self.data.score(&text.to_lowercase())
    }

    /// Advisory score
    pub fn score_advice(&self, text: &str) -> u32 {
        self.advice.score(&text.to_lowercase())
    }
}

impl Default for KeywordScorer {
    fn default() -> Self {
        Self::new(&KeywordConfig::default())
    }
}
