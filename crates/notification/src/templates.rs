//! Message bodies for order notifications.

use common::Money;
use domain::PlacedOrder;

use crate::email::EmailMessage;

/// Text sent to the customer's phone.
pub fn order_sms(placed: &PlacedOrder) -> String {
    format!(
        "Order Confirmed!\nOrder ID: {}\nTotal: {}\nItems: {}\nWe'll notify you when it's ready. Thank you!",
        placed.order.id, placed.order.total_amount, placed.order.total_items,
    )
}

/// Subject line of the administrator email.
pub fn order_email_subject(placed: &PlacedOrder) -> String {
    format!("New Order Received - #{}", placed.order.reference_number)
}

/// HTML email telling the administrator about a new order.
pub fn order_email(placed: &PlacedOrder, admin_email: &str) -> EmailMessage {
    EmailMessage {
        to: vec![admin_email.to_string()],
        subject: order_email_subject(placed),
        html_body: order_email_body(placed),
    }
}

pub fn order_email_body(placed: &PlacedOrder) -> String {
    let order = &placed.order;
    let subtotal: Money = placed.items.iter().map(|line| line.total_amount).sum();
    let discount = order.discount.unwrap_or_else(Money::zero);

    let rows: String = placed
        .items
        .iter()
        .map(|line| {
            format!(
                "\n<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                line.product_id, line.unit_price, line.quantity, line.total_amount
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<style>
body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
.container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
.table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}
.table th, .table td {{ padding: 12px; text-align: left; border-bottom: 1px solid #ddd; }}
.total-row {{ font-weight: bold; background: #f8f9fa; }}
</style>
</head>
<body>
<div class="container">
<h1>New Order Received</h1>
<h2>Order Details</h2>
<p><strong>Order Reference:</strong> {reference}</p>
<p><strong>Order ID:</strong> {id}</p>
<p><strong>Order Date:</strong> {date}</p>
<p><strong>Customer Phone:</strong> {phone}</p>
<p><strong>Order Status:</strong> <span class="status-{status}">{status}</span></p>
<p><strong>Payment Method:</strong> {payment}</p>
<p><strong>Order Medium:</strong> {medium}</p>
<h2>Order Items</h2>
<table class="table">
<thead><tr><th>Product ID</th><th>Unit Price</th><th>Quantity</th><th>Total</th></tr></thead>
<tbody>{rows}
</tbody>
<tfoot>
<tr class="total-row"><td colspan="3">Subtotal:</td><td>{subtotal}</td></tr>
<tr class="total-row"><td colspan="3">Discount:</td><td>{discount}</td></tr>
<tr class="total-row"><td colspan="3">Total Amount:</td><td>{total}</td></tr>
</tfoot>
</table>
<p>Please review this order in the admin dashboard.</p>
</div>
</body>
</html>"#,
        reference = escape_html(&order.reference_number),
        id = order.id,
        date = order.created_at.format("%Y-%m-%d %H:%M:%S"),
        phone = escape_html(order.phone_number.as_deref().unwrap_or("")),
        status = order.order_status,
        payment = order.payment_method,
        medium = order.order_medium,
        rows = rows,
        subtotal = subtotal,
        discount = discount,
        total = order.total_amount,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
