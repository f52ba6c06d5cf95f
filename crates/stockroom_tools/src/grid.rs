#![forbid(unsafe_code)]

use stockroom_contracts::format_wire_datetime;
use stockroom_contracts::product::ProductRecord;
use stockroom_contracts::purchase_order::{OrderLine, PurchaseOrderRecord};
use stockroom_contracts::stock::StockRecord;
use stockroom_contracts::supplier::SupplierRecord;
use stockroom_contracts::warehouse::WarehouseRecord;

/// A list rendered as left-aligned text columns, one row per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    /// Missing trailing cells render empty; extra cells are dropped.
    pub fn push(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(line(self.headers.iter().copied(), &widths));
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &self.rows {
            out.push(line(row.iter().map(String::as_str), &widths));
        }
        if self.rows.is_empty() {
            out.push("(no rows)".to_string());
        }
        out.join("\n")
    }
}

fn line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, w)| format!("{cell:<w$}", w = *w))
        .collect();
    padded.join("  ").trim_end().to_string()
}

fn opt(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

pub fn products(rows: &[ProductRecord]) -> Grid {
    let mut grid = Grid::new(&["ID", "SKU", "NOMBRE", "CATEGORIA", "PRECIO", "ESTADO"]);
    for p in rows {
        grid.push(vec![
            p.id.to_string(),
            p.sku.clone(),
            p.name.clone(),
            p.category.clone(),
            p.price.to_string(),
            p.status.as_str().to_string(),
        ]);
    }
    grid
}

pub fn suppliers(rows: &[SupplierRecord]) -> Grid {
    let mut grid = Grid::new(&[
        "ID", "NIT/RUC", "NOMBRE", "CONTACTO", "EMAIL", "TELEFONO", "ESTADO",
    ]);
    for s in rows {
        grid.push(vec![
            s.id.to_string(),
            s.tax_id.clone(),
            s.name.clone(),
            s.contact.clone(),
            s.email.clone(),
            opt(&s.phone),
            s.status.as_str().to_string(),
        ]);
    }
    grid
}

pub fn warehouses(rows: &[WarehouseRecord]) -> Grid {
    let mut grid = Grid::new(&["ID", "NOMBRE", "DIRECCION", "CAPACIDAD", "ESTADO"]);
    for w in rows {
        grid.push(vec![
            w.id.to_string(),
            w.name.clone(),
            w.address.clone(),
            w.capacity.to_string(),
            w.status.as_str().to_string(),
        ]);
    }
    grid
}

/// Stock rows; critical records are flagged in the last column.
pub fn stock(rows: &[StockRecord]) -> Grid {
    let mut grid = Grid::new(&["ID", "PRODUCTO", "BODEGA", "CANTIDAD", "MINIMO", "CRITICO"]);
    for r in rows {
        grid.push(vec![
            r.id.to_string(),
            r.product_id.to_string(),
            r.warehouse_id.to_string(),
            r.quantity.to_string(),
            r.min_quantity.to_string(),
            if r.is_critical() { "SI" } else { "" }.to_string(),
        ]);
    }
    grid
}

pub fn orders(rows: &[PurchaseOrderRecord]) -> Grid {
    let mut grid = Grid::new(&[
        "ID",
        "FACTURA",
        "PROVEEDOR",
        "EMISION",
        "LINEAS",
        "SUBTOTAL",
        "IVA",
        "TOTAL",
        "ESTADO",
    ]);
    for o in rows {
        grid.push(vec![
            o.id.to_string(),
            o.invoice_number.clone(),
            o.supplier_id.to_string(),
            format_wire_datetime(&o.issued_at),
            o.lines.len().to_string(),
            o.subtotal.to_string(),
            o.tax.to_string(),
            o.total.to_string(),
            o.status.as_str().to_string(),
        ]);
    }
    grid
}

pub fn order_lines(rows: &[OrderLine]) -> Grid {
    let mut grid = Grid::new(&[
        "ID", "PRODUCTO", "NOMBRE", "CANTIDAD", "PRECIO", "DESC %", "SUBTOTAL",
    ]);
    for l in rows {
        grid.push(vec![
            l.id.to_string(),
            l.product_id.to_string(),
            l.product_name.clone(),
            l.quantity.to_string(),
            l.unit_price.to_string(),
            l.discount_pct.to_string(),
            l.subtotal.to_string(),
        ]);
    }
    grid
}
