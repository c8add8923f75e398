//! Message bodies for every notification the marketplace sends.

use crate::models::OutgoingEmail;

const BRAND: &str = "FinServ Marketplace";

fn layout(heading: &str, body: &str) -> String {
    format!(
        r#"
        <!DOCTYPE html>
        <html>
        <head>
            <style>
                body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
                .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
                .header {{ background: #1d3557; color: white; padding: 24px; text-align: center; border-radius: 10px 10px 0 0; }}
                .content {{ background: #f9f9f9; padding: 24px; border-radius: 0 0 10px 10px; }}
                .button {{ display: inline-block; background: #1d3557; color: white; padding: 10px 18px; border-radius: 6px; text-decoration: none; }}
                .footer {{ text-align: center; margin-top: 20px; color: #666; font-size: 12px; }}
            </style>
        </head>
        <body>
            <div class="container">
                <div class="header"><h1>{heading}</h1></div>
                <div class="content">
                    {body}
                    <p>Best regards,<br><strong>{brand} Team</strong></p>
                </div>
                <div class="footer"><p>© {brand}. All rights reserved.</p></div>
            </div>
        </body>
        </html>
        "#,
        heading = heading,
        body = body,
        brand = BRAND,
    )
}

fn greeting(name: &str) -> &str {
    if name.trim().is_empty() { "there" } else { name }
}

pub fn welcome_user(to: &str, name: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Welcome to {}!", BRAND),
        html: layout(
            "Welcome aboard",
            &format!(
                "<p>Hi {},</p><p>Your account is ready. You can now apply for loans, \
                 CA services and government schemes and track every application from your dashboard.</p>",
                greeting(name)
            ),
        ),
    }
}

pub fn new_client_for_partner(to: &str, partner_name: &str, client_name: &str, client_email: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "A new client has joined through you".to_string(),
        html: layout(
            "New client",
            &format!(
                "<p>Hi {},</p><p><strong>{}</strong> ({}) signed up and is now linked to your account.</p>",
                greeting(partner_name),
                client_name,
                client_email
            ),
        ),
    }
}

pub fn partner_application_received(to: &str, name: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "We received your partner application".to_string(),
        html: layout(
            "Application received",
            &format!(
                "<p>Hi {},</p><p>Thanks for applying to become a partner. Our team will review your \
                 details and you will be able to sign in once your account is approved.</p>",
                greeting(name)
            ),
        ),
    }
}

pub fn admin_new_partner(to: &str, partner_name: &str, partner_email: &str, business_model: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("New partner awaiting approval: {}", partner_name),
        html: layout(
            "Partner awaiting approval",
            &format!(
                "<p><strong>{}</strong> ({}) registered as a <strong>{}</strong> partner and is waiting for approval.</p>",
                partner_name, partner_email, business_model
            ),
        ),
    }
}

pub fn partner_approved(to: &str, name: &str, login_url: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Your partner account has been approved".to_string(),
        html: layout(
            "You're approved",
            &format!(
                "<p>Hi {},</p><p>Your partner account is active. You can now sign in and start \
                 submitting applications for your clients.</p><p><a class=\"button\" href=\"{}\">Sign in</a></p>",
                greeting(name),
                login_url
            ),
        ),
    }
}

pub fn application_received(to: &str, name: &str, application_type: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Your {} application was received", application_type),
        html: layout(
            "Application received",
            &format!(
                "<p>Hi {},</p><p>We received your <strong>{}</strong> application. \
                 We will keep you posted as it moves through review.</p>",
                greeting(name),
                application_type
            ),
        ),
    }
}

pub fn admin_new_application(to: &str, application_type: &str, applicant: &str, submitted_by: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("New {} application", application_type),
        html: layout(
            "New application",
            &format!(
                "<p>A new <strong>{}</strong> application for <strong>{}</strong> was submitted by {}.</p>",
                application_type, applicant, submitted_by
            ),
        ),
    }
}

pub fn status_changed(to: &str, name: &str, application_type: &str, status: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("Your {} application is now {}", application_type, status),
        html: layout(
            "Application update",
            &format!(
                "<p>Hi {},</p><p>The status of your <strong>{}</strong> application changed to \
                 <strong>{}</strong>.</p>",
                greeting(name),
                application_type,
                status
            ),
        ),
    }
}

pub fn password_reset(to: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        html: layout(
            "Password reset",
            &format!(
                "<p>We received a request to reset your password. The link below is valid for one hour.</p>\
                 <p><a class=\"button\" href=\"{}\">Reset password</a></p>\
                 <p>If you didn't request this, you can ignore this email.</p>",
                link
            ),
        ),
    }
}
