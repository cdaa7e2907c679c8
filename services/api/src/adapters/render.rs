//! services/api/src/adapters/render.rs
//!
//! Renders invoices and receipts as self-contained printable HTML
//! documents. These are what families and tutors actually receive, so
//! the layout stays deliberately simple: header, parties, a line table
//! and the total.

use tuition_center_core::domain::{Student, StudentInvoice, Tutor, TutorReceipt};

/// One row of a tutor receipt: all classes taught to one student at
/// that pairing's rate.
#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub student_name: String,
    pub classes: i64,
    pub pay_per_class_minor: i64,
}

impl ReceiptLine {
    pub fn earnings_minor(&self) -> i64 {
        self.classes * self.pay_per_class_minor
    }
}

/// Formats minor currency units as rupees, e.g. `150050` -> `₹1500.50`.
pub fn format_money(minor: i64) -> String {
    format!("₹{}.{:02}", minor / 100, (minor % 100).abs())
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; color: #222; } \
     .header { border-bottom: 3px solid #2c3e50; padding-bottom: 12px; margin-bottom: 24px; } \
     .header h1 { margin: 0; color: #2c3e50; } \
     .meta { margin-bottom: 24px; } \
     .meta p { margin: 4px 0; } \
     table { width: 100%; border-collapse: collapse; margin-bottom: 24px; } \
     th, td { border: 1px solid #ccc; padding: 8px 12px; text-align: left; } \
     th { background: #2c3e50; color: #fff; } \
     .total-row td { font-weight: bold; background: #f4f6f7; } \
     .status { font-size: 14px; padding: 4px 10px; border-radius: 4px; background: #eee; } \
     .footer { margin-top: 32px; font-size: 12px; color: #777; }";

pub fn student_invoice_html(center_name: &str, invoice: &StudentInvoice, student: &Student) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n<head>\n<meta charset=\"utf-8\">\n<title>{number}</title>\n\
         <style>{style}</style>\n</head>\n<body>\n\
         <div class=\"header\"><h1>{center}</h1><p>Tuition Invoice</p></div>\n\
         <div class=\"meta\">\n\
         <p><strong>Invoice No:</strong> {number}</p>\n\
         <p><strong>Billing Period:</strong> {start} to {end}</p>\n\
         <p><strong>Generated:</strong> {generated}</p>\n\
         <p><strong>Student:</strong> {student_name} ({class_level})</p>\n\
         <p><strong>Billed To:</strong> {parent_name}</p>\n\
         <p><strong>Status:</strong> <span class=\"status\">{status}</span></p>\n\
         </div>\n\
         <table>\n\
         <tr><th>Description</th><th>Classes</th><th>Fee per Class</th><th>Amount</th></tr>\n\
         <tr><td>Classes attended {start} to {end}</td><td>{classes}</td><td>{fee}</td><td>{total}</td></tr>\n\
         <tr class=\"total-row\"><td colspan=\"3\">Total Due</td><td>{total}</td></tr>\n\
         </table>\n\
         <div class=\"footer\">Amount received so far: {paid}. \
         Please reach out on WhatsApp for payment queries.</div>\n\
         </body>\n</html>\n",
        style = STYLE,
        center = escape(center_name),
        number = escape(&invoice.invoice_number),
        start = invoice.start_date.format("%d %b %Y"),
        end = invoice.end_date.format("%d %b %Y"),
        generated = invoice.generated_at.format("%d %b %Y"),
        student_name = escape(&student.full_name),
        class_level = escape(&student.class_level),
        parent_name = escape(&student.parent_name),
        status = invoice.status.as_str(),
        classes = invoice.total_classes,
        fee = format_money(student.per_class_fee_minor),
        total = format_money(invoice.total_amount_minor),
        paid = format_money(invoice.amount_paid_minor),
    )
}

pub fn tutor_receipt_html(
    center_name: &str,
    receipt: &TutorReceipt,
    tutor: &Tutor,
    lines: &[ReceiptLine],
) -> String {
    let mut rows = String::new();
    for line in lines {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&line.student_name),
            line.classes,
            format_money(line.pay_per_class_minor),
            format_money(line.earnings_minor()),
        ));
    }

    let upi = tutor.upi_id.as_deref().unwrap_or("not on file");

    format!(
        "<!DOCTYPE html>\n\
         <html>\n<head>\n<meta charset=\"utf-8\">\n<title>{number}</title>\n\
         <style>{style}</style>\n</head>\n<body>\n\
         <div class=\"header\"><h1>{center}</h1><p>Tutor Payment Receipt</p></div>\n\
         <div class=\"meta\">\n\
         <p><strong>Receipt No:</strong> {number}</p>\n\
         <p><strong>Payment Period:</strong> {start} to {end}</p>\n\
         <p><strong>Tutor:</strong> {tutor_name}</p>\n\
         <p><strong>UPI:</strong> {upi}</p>\n\
         <p><strong>Status:</strong> <span class=\"status\">{status}</span></p>\n\
         </div>\n\
         <table>\n\
         <tr><th>Student</th><th>Classes</th><th>Pay per Class</th><th>Earnings</th></tr>\n\
         {rows}\
         <tr class=\"total-row\"><td colspan=\"2\">Total ({classes} classes)</td>\
         <td></td><td>{total}</td></tr>\n\
         </table>\n\
         <div class=\"footer\">Generated {generated}. Payment is made to the UPI ID above.</div>\n\
         </body>\n</html>\n",
        style = STYLE,
        center = escape(center_name),
        number = escape(&receipt.receipt_number),
        start = receipt.start_date.format("%d %b %Y"),
        end = receipt.end_date.format("%d %b %Y"),
        tutor_name = escape(&tutor.full_name),
        upi = escape(upi),
        status = receipt.status.as_str(),
        rows = rows,
        classes = receipt.total_classes,
        total = format_money(receipt.total_earnings_minor),
        generated = receipt.generated_at.format("%d %b %Y"),
    )
}
