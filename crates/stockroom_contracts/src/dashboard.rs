#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Counters shown on the console landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(rename = "totalProductos")]
    pub total_products: u64,
    #[serde(rename = "totalProveedores")]
    pub total_suppliers: u64,
    #[serde(rename = "totalBodegas")]
    pub total_warehouses: u64,
    #[serde(rename = "totalOrdenes")]
    pub total_orders: u64,
    #[serde(rename = "stockCritico")]
    pub critical_stock: u64,
    #[serde(rename = "ordenesPendientes")]
    pub pending_orders: u64,
    #[serde(rename = "productosActivos")]
    pub active_products: u64,
    #[serde(rename = "proveedoresActivos")]
    pub active_suppliers: u64,
    #[serde(rename = "bodegasActivas")]
    pub active_warehouses: u64,
}
