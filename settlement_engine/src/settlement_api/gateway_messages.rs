//! Customer-facing explanations for gateway rejection codes.

/// Shown when the gateway returns a code that is not in the table.
pub const GENERIC_REJECTION: &str =
    "The payment could not be processed. Please try again or use another payment method.";

const MESSAGES: &[(&str, &str)] = &[
    ("01", "Please contact your bank to authorise this payment."),
    ("05", "Your bank declined the payment."),
    ("12", "The transaction is not valid. Please check the payment details."),
    ("13", "The amount is not valid for this payment method."),
    ("14", "The phone number or identity document is not registered for mobile payments."),
    ("30", "The payment details are incomplete or badly formatted."),
    ("41", "This account cannot be used for payments. Please contact your bank."),
    ("51", "There are not enough funds in the account."),
    ("55", "The one-time code is not correct."),
    ("56", "The one-time code has already been used. Please request a new one."),
    ("57", "This account is not allowed to make this kind of payment."),
    ("61", "The payment exceeds your daily limit."),
    ("65", "You have reached the maximum number of payments for today."),
    ("80", "The one-time code has expired. Please request a new one."),
    ("91", "Your bank is not responding at the moment. Please try again later."),
    ("96", "The payment system is temporarily unavailable. Please try again later."),
];

/// The message to show the payer for a gateway rejection code.
pub fn rejection_message(code: &str) -> &'static str {
    MESSAGES.iter().find(|(c, _)| *c == code.trim()).map(|(_, m)| *m).unwrap_or(GENERIC_REJECTION)
}
