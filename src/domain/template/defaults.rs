//! Compiled-in fallback templates, one per notification type.

use crate::notification::NotificationType;

use super::types::DefaultTemplate;

/// The fallback template for `notification_type`.
///
/// Total over [`NotificationType`]; adding a variant without a default here
/// does not compile.
pub fn default_template(notification_type: NotificationType) -> DefaultTemplate {
    match notification_type {
        NotificationType::LeaveRequestSubmitted => LEAVE_REQUEST_SUBMITTED,
        NotificationType::LeaveRequestApproved => LEAVE_REQUEST_APPROVED,
        NotificationType::LeaveRequestRejected => LEAVE_REQUEST_REJECTED,
        NotificationType::LeaveRequestCancelled => LEAVE_REQUEST_CANCELLED,
        NotificationType::AssetAssigned => ASSET_ASSIGNED,
        NotificationType::AssetReturned => ASSET_RETURNED,
        NotificationType::WelcomeEmail => WELCOME_EMAIL,
        NotificationType::PasswordReset => PASSWORD_RESET,
        NotificationType::Appreciation => APPRECIATION,
        NotificationType::Announcement => ANNOUNCEMENT,
        NotificationType::Custom => CUSTOM,
    }
}

const LEAVE_REQUEST_SUBMITTED: DefaultTemplate = DefaultTemplate {
    subject: "New Leave Request - {{employeeName}}",
    html_body: r#"<h2>New Leave Request</h2>
<p>Hello {{recipientName}},</p>
<p><strong>{{employeeName}}</strong> has submitted a leave request that needs your attention.</p>
<table class="details">
  <tr><td>Leave type</td><td>{{leaveType}}</td></tr>
  <tr><td>From</td><td>{{startDate}}</td></tr>
  <tr><td>To</td><td>{{endDate}}</td></tr>
  <tr><td>Days</td><td>{{totalDays}}</td></tr>
  <tr><td>Reason</td><td>{{reason}}</td></tr>
</table>
<p><a class="button" href="{{actionUrl}}">Review request</a></p>"#,
    variables: &[
        "recipientName",
        "employeeName",
        "leaveType",
        "startDate",
        "endDate",
        "totalDays",
        "reason",
        "actionUrl",
    ],
};

const LEAVE_REQUEST_APPROVED: DefaultTemplate = DefaultTemplate {
    subject: "Leave Request Approved - {{leaveType}}",
    html_body: r#"<h2>Leave Request Approved</h2>
<p>Hello {{recipientName}},</p>
<p>The {{leaveType}} request for <strong>{{employeeName}}</strong> from {{startDate}} to {{endDate}} ({{totalDays}} days) has been approved by {{approverName}}.</p>
<p>{{comments}}</p>"#,
    variables: &[
        "recipientName",
        "employeeName",
        "leaveType",
        "startDate",
        "endDate",
        "totalDays",
        "approverName",
        "comments",
    ],
};

const LEAVE_REQUEST_REJECTED: DefaultTemplate = DefaultTemplate {
    subject: "Leave Request Rejected - {{leaveType}}",
    html_body: r#"<h2>Leave Request Rejected</h2>
<p>Hello {{recipientName}},</p>
<p>The {{leaveType}} request for <strong>{{employeeName}}</strong> from {{startDate}} to {{endDate}} has been rejected by {{approverName}}.</p>
<p>Reason: {{comments}}</p>"#,
    variables: &[
        "recipientName",
        "employeeName",
        "leaveType",
        "startDate",
        "endDate",
        "approverName",
        "comments",
    ],
};

const LEAVE_REQUEST_CANCELLED: DefaultTemplate = DefaultTemplate {
    subject: "Leave Request Cancelled - {{leaveType}}",
    html_body: r#"<h2>Leave Request Cancelled</h2>
<p>Hello {{recipientName}},</p>
<p>The {{leaveType}} request for <strong>{{employeeName}}</strong> from {{startDate}} to {{endDate}} has been cancelled.</p>
<p>{{comments}}</p>"#,
    variables: &[
        "recipientName",
        "employeeName",
        "leaveType",
        "startDate",
        "endDate",
        "comments",
    ],
};

const ASSET_ASSIGNED: DefaultTemplate = DefaultTemplate {
    subject: "Asset Assigned - {{assetName}}",
    html_body: r#"<h2>Asset Assigned</h2>
<p>Hello {{recipientName}},</p>
<p>The following asset has been assigned to <strong>{{employeeName}}</strong> by {{assignedBy}}:</p>
<table class="details">
  <tr><td>Asset</td><td>{{assetName}}</td></tr>
  <tr><td>Tag</td><td>{{assetTag}}</td></tr>
  <tr><td>Category</td><td>{{assetCategory}}</td></tr>
  <tr><td>Assigned on</td><td>{{assignedDate}}</td></tr>
</table>
<p>{{notes}}</p>"#,
    variables: &[
        "recipientName",
        "employeeName",
        "assetName",
        "assetTag",
        "assetCategory",
        "assignedDate",
        "assignedBy",
        "notes",
    ],
};

const ASSET_RETURNED: DefaultTemplate = DefaultTemplate {
    subject: "Asset Returned - {{assetName}}",
    html_body: r#"<h2>Asset Returned</h2>
<p>Hello {{recipientName}},</p>
<p><strong>{{employeeName}}</strong> has returned {{assetName}} ({{assetTag}}) on {{returnedDate}}.</p>
<p>Condition: {{condition}}</p>
<p>{{notes}}</p>"#,
    variables: &[
        "recipientName",
        "employeeName",
        "assetName",
        "assetTag",
        "returnedDate",
        "condition",
        "notes",
    ],
};

const WELCOME_EMAIL: DefaultTemplate = DefaultTemplate {
    subject: "Welcome to {{companyName}}, {{employeeName}}!",
    html_body: r#"<h2>Welcome aboard!</h2>
<p>Hello {{employeeName}},</p>
<p>Your account at {{companyName}} is ready. You can sign in with:</p>
<table class="details">
  <tr><td>Email</td><td>{{recipientEmail}}</td></tr>
  <tr><td>Temporary password</td><td>{{temporaryPassword}}</td></tr>
</table>
<p>Please change your password after your first login.</p>
<p><a class="button" href="{{loginUrl}}">Sign in</a></p>"#,
    variables: &[
        "employeeName",
        "companyName",
        "recipientEmail",
        "temporaryPassword",
        "loginUrl",
    ],
};

const PASSWORD_RESET: DefaultTemplate = DefaultTemplate {
    subject: "Password Reset Request",
    html_body: r#"<h2>Reset your password</h2>
<p>Hello {{recipientName}},</p>
<p>We received a request to reset your password. The link below expires in {{expiresIn}}.</p>
<p><a class="button" href="{{resetUrl}}">Reset password</a></p>
<p>If you did not request this, you can ignore this email.</p>"#,
    variables: &["recipientName", "resetUrl", "expiresIn"],
};

const APPRECIATION: DefaultTemplate = DefaultTemplate {
    subject: "{{senderName}} appreciated you!",
    html_body: r#"<h2>You've been appreciated</h2>
<p>Hello {{recipientName}},</p>
<p><strong>{{senderName}}</strong> recognised you for <em>{{category}}</em>:</p>
<blockquote>{{message}}</blockquote>"#,
    variables: &["recipientName", "senderName", "category", "message"],
};

const ANNOUNCEMENT: DefaultTemplate = DefaultTemplate {
    subject: "Announcement: {{title}}",
    html_body: r#"<h2>{{title}}</h2>
<p>Hello {{recipientName}},</p>
<div>{{content}}</div>
<p>Posted by {{authorName}}</p>"#,
    variables: &["recipientName", "title", "content", "authorName"],
};

const CUSTOM: DefaultTemplate = DefaultTemplate {
    subject: "{{subject}}",
    html_body: r#"<p>Hello {{recipientName}},</p>
<div>{{message}}</div>"#,
    variables: &["recipientName", "subject", "message"],
};
