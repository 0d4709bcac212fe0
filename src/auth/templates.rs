/// Rendered password reset email.
pub struct ResetEmail {
    pub subject: &'static str,
    pub text: String,
    pub html: String,
}

pub fn reset_url(frontend_url: &str, raw_token: &str) -> String {
    format!("{frontend_url}/reset-password/{raw_token}")
}

pub fn password_reset_email(reset_url: &str) -> ResetEmail {
    let text = format!(
        "We received a request to reset your password.\n\n\
         Open the link below to choose a new one. It expires in 1 hour.\n\n\
         {reset_url}\n\n\
         If you didn't request this, you can ignore this email."
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Reset Your Password</title>
</head>
<body style="margin:0;padding:0;font-family:'Segoe UI',Tahoma,Verdana,sans-serif;background-color:#f9fafb;color:#333333;">
  <table align="center" border="0" cellpadding="0" cellspacing="0" width="100%" style="max-width:600px;background-color:#ffffff;">
    <tr>
      <td style="padding:36px 30px 0 30px;font-size:24px;font-weight:bold;">Password Reset Request</td>
    </tr>
    <tr>
      <td style="padding:20px 30px;font-size:16px;line-height:24px;">
        We received a request to reset your password. This link will expire in <strong>1 hour</strong>.
      </td>
    </tr>
    <tr>
      <td align="center" style="padding:20px 30px;">
        <a href="{reset_url}" target="_blank" style="display:inline-block;padding:16px 36px;font-size:16px;color:#ffffff;background-color:#4f46e5;text-decoration:none;border-radius:6px;font-weight:bold;">Reset Your Password</a>
      </td>
    </tr>
    <tr>
      <td style="padding:0 30px 20px 30px;font-size:14px;line-height:22px;color:#666666;word-break:break-all;">
        If the button doesn't work, paste this link into your browser:<br>
        <a href="{reset_url}" style="color:#4f46e5;">{reset_url}</a>
      </td>
    </tr>
    <tr>
      <td style="padding:20px 30px;font-size:14px;color:#666666;border-top:1px solid #eeeeee;">
        If you didn't request this password reset, please ignore this email.
      </td>
    </tr>
  </table>
</body>
</html>
"#
    );

    ResetEmail {
        subject: "Reset your password",
        text,
        html,
    }
}
